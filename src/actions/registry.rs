//! Action type → handler table.

use std::collections::HashMap;
use std::fmt;

use tracing::{info, warn};

use super::dispatcher::ActionDispatcher;
use super::http::{execute_request, request_for_action};
use super::macro_script::{parse_macro_script, run_macro};
use super::status::{ActionStatus, FAILURE_CODE};
use crate::config::ActionConfig;
use crate::device::{SharedKeyboard, SharedTransport, lock_shared};

/// Executes one action. The dispatcher is passed so handlers can recurse.
pub type Handler = Box<dyn Fn(&ActionConfig, &ActionDispatcher<'_>) -> ActionStatus + Send + Sync>;

/// Maps action `type` strings to handlers, with a fallback for the rest.
pub struct ActionRegistry {
    handlers: HashMap<String, Handler>,
    default_handler: Handler,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("types", &self.registered_types())
            .finish_non_exhaustive()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn log_invoked(action: &ActionConfig) -> ActionStatus {
    info!(
        action = action.label(),
        r#type = %action.action_type,
        payload = %action.payload,
        "Handler invoked"
    );
    ActionStatus::ok()
}

fn unknown_type(action: &ActionConfig, _: &ActionDispatcher<'_>) -> ActionStatus {
    warn!(
        action = action.label(),
        r#type = %action.action_type,
        "Unknown action type (no-op)"
    );
    ActionStatus::ok_with(0, format!("unknown action type: {}", action.action_type))
}

impl ActionRegistry {
    /// Registry with the built-in handlers.
    ///
    /// `macro` and `http_request` fail until a keyboard or transport is
    /// installed with [`with_keyboard`](Self::with_keyboard) or
    /// [`with_http`](Self::with_http).
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
            default_handler: Box::new(unknown_type),
        };
        registry.register("hid_key", |action, _| log_invoked(action));
        registry.register("ble_key", |action, _| log_invoked(action));
        registry.register("composite", |action, dispatcher| {
            log_invoked(action);
            dispatcher.dispatch_actions(&action.actions)
        });
        registry.register("macro", |_, _| {
            ActionStatus::failure(FAILURE_CODE, "macro requires keyboard output")
        });
        registry.register("http_request", |_, _| {
            ActionStatus::failure(FAILURE_CODE, "http_request requires network transport")
        });
        registry
    }

    /// Add or replace the handler for `action_type`.
    pub fn register<F>(&mut self, action_type: impl Into<String>, handler: F)
    where
        F: Fn(&ActionConfig, &ActionDispatcher<'_>) -> ActionStatus + Send + Sync + 'static,
    {
        self.handlers.insert(action_type.into(), Box::new(handler));
    }

    /// Replace the handler used for unregistered types.
    pub fn register_default<F>(&mut self, handler: F)
    where
        F: Fn(&ActionConfig, &ActionDispatcher<'_>) -> ActionStatus + Send + Sync + 'static,
    {
        self.default_handler = Box::new(handler);
    }

    /// Run `macro` actions on `keyboard`.
    ///
    /// Structured `steps` are used when present, otherwise the payload script.
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: SharedKeyboard) -> Self {
        self.register("macro", move |action, dispatcher| {
            let parsed;
            let steps = if action.steps.is_empty() {
                parsed = parse_macro_script(&action.payload, dispatcher.limits());
                &parsed
            } else {
                &action.steps
            };
            let mut output = lock_shared(&keyboard);
            let report = run_macro(steps, &mut *output, dispatcher.sleeper(), dispatcher.limits());
            if report.unresolved.is_empty() {
                ActionStatus::ok()
            } else {
                ActionStatus::ok_with(
                    0,
                    format!("unresolved keys: {}", report.unresolved.join(", ")),
                )
            }
        });
        self
    }

    /// Run `http_request` actions over `transport`.
    #[must_use]
    pub fn with_http(mut self, transport: SharedTransport) -> Self {
        self.register("http_request", move |action, dispatcher| {
            let definition = request_for_action(action);
            let mut session = lock_shared(&transport);
            execute_request(&definition, &mut *session, dispatcher.limits())
        });
        self
    }

    /// Run the handler registered for `action.action_type`, or the default.
    pub fn dispatch(&self, action: &ActionConfig, dispatcher: &ActionDispatcher<'_>) -> ActionStatus {
        self.handlers
            .get(&action.action_type)
            .unwrap_or(&self.default_handler)(action, dispatcher)
    }

    #[must_use]
    pub fn has_handler(&self, action_type: &str) -> bool {
        self.handlers.contains_key(action_type)
    }

    /// Registered type names, sorted.
    #[must_use]
    pub fn registered_types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
