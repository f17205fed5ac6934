//! Macro keypad library - decision core for a four-button chording keypad.
//!
//! This library exposes the core of the `keypad` CLI for use in tests and
//! firmware-style hosts.
//!
//! # Modules
//!
//! - `config`: Configuration model, parser, storage sources and loader
//! - `chord`: Debounce and chord recognition
//! - `actions`: Action registry, dispatcher, macro and HTTP payloads
//! - `device`: Keyboard, network, input and pause collaborators
//! - `runtime`: The control loop tying them together
//! - `error`: Error types with user-recoverable hints
#![forbid(unsafe_code)]

pub mod actions;
pub mod chord;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod runtime;
