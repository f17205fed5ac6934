//! Action execution: handler registry, dispatcher and the two payload
//! languages (keystroke macros and HTTP request descriptors).

pub mod dispatcher;
pub mod http;
pub mod keys;
pub mod macro_script;
pub mod registry;
pub mod status;

pub use dispatcher::ActionDispatcher;
pub use http::{execute_request, parse_request_descriptor, request_for_action};
pub use keys::resolve_key;
pub use macro_script::{MacroReport, parse_macro_script, run_macro};
pub use registry::{ActionRegistry, Handler};
pub use status::{ActionStatus, FAILURE_CODE};
