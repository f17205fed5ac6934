//! Error types for keypad operations.

use thiserror::Error;

/// Primary error type for keypad operations.
#[derive(Error, Debug)]
pub enum KeypadError {
    // Configuration errors
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration parse error at line {line}: {message}")]
    ConfigParse { line: usize, message: String },

    #[error("Config validation failed ({} error(s))", errors.len())]
    ConfigInvalid { errors: Vec<String> },

    #[error("Configuration has no profiles")]
    NoProfiles,

    #[error("Profile not found: {id}")]
    ProfileNotFound { id: String },

    #[error("Key not found: {id}")]
    KeyNotFound { id: String },

    // Device errors
    #[error("No Stream Deck devices found")]
    NoDevicesFound,

    #[error("Device not found: {serial}")]
    DeviceNotFound { serial: String },

    #[error("Multiple devices found, specify --serial: {serials:?}")]
    MultipleDevices { serials: Vec<String> },

    #[error("Device communication error: {0}")]
    DeviceCommunication(String),

    // Action errors
    #[error("Action failed (code {code}): {message}")]
    ActionFailed { code: i32, message: String },

    #[error("HTTP transport error: {0}")]
    Http(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl KeypadError {
    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigParse { .. }
                | Self::ConfigInvalid { .. }
                | Self::ProfileNotFound { .. }
                | Self::KeyNotFound { .. }
                | Self::NoDevicesFound
                | Self::DeviceNotFound { .. }
                | Self::MultipleDevices { .. }
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound { .. } => {
                Some("Create config.yaml in the config dir or pass --config-dir")
            }
            Self::ConfigInvalid { .. } => Some("Run: keypad check <FILE> to list every problem"),
            Self::ProfileNotFound { .. } => Some("Run: keypad profiles to list profile ids"),
            Self::NoDevicesFound => Some("Ensure the Stream Deck is connected via USB"),
            Self::MultipleDevices { .. } => Some("Use --serial to specify which device"),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using KeypadError.
pub type Result<T> = std::result::Result<T, KeypadError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| KeypadError::Other(format!("{}: {e}", f().into())))
    }
}
