//! Integration tests for the keypad crate.
//!
//! These tests exercise the public API end to end without hardware, using
//! the recording collaborators from `keypad::device::mock`.
//!
//! # Modules
//!
//! - `config_loading`: parsing, validation, sources and atomic reload
//! - `chord_events`: debounce timing and chord recognition
//! - `action_dispatch`: registry, dispatcher, macros and HTTP actions
//! - `keypad_runtime`: samples in, dispatched keys out

mod common;

#[path = "integration/config_loading.rs"]
mod config_loading;

#[path = "integration/chord_events.rs"]
mod chord_events;

#[path = "integration/action_dispatch.rs"]
mod action_dispatch;

#[path = "integration/keypad_runtime.rs"]
mod keypad_runtime;
