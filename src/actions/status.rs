//! Uniform outcome of running an action.

use serde::Serialize;

/// Status code used when no HTTP or device code applies.
pub const FAILURE_CODE: i32 = -1;

/// Result of dispatching an action or an action list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionStatus {
    pub success: bool,
    pub status_code: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Default for ActionStatus {
    fn default() -> Self {
        Self::ok()
    }
}

impl ActionStatus {
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            status_code: 0,
            message: String::new(),
        }
    }

    /// Success carrying a code and a note, e.g. an HTTP 204.
    #[must_use]
    pub fn ok_with(status_code: i32, message: impl Into<String>) -> Self {
        Self {
            success: true,
            status_code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn failure(status_code: i32, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            message: message.into(),
        }
    }
}
