//! Hardware and network collaborators used by the keypad core.
//!
//! The decision logic never touches a device directly. It talks to these
//! narrow traits, implemented here by real adapters ([`StreamDeckSampler`],
//! [`ConsoleKeyboard`], [`ReqwestTransport`], [`ThreadSleeper`]) and by the
//! recording doubles in [`mock`].

mod http;
pub mod mock;
mod real;

pub use http::ReqwestTransport;
pub use real::{ConsoleKeyboard, DeviceSummary, StreamDeckSampler, list_devices};

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::chord::KEY_COUNT;
use crate::error::Result;

/// HID keyboard output. Codes follow the Arduino `Keyboard` numbering.
pub trait KeyboardOutput {
    /// Press and hold a key.
    fn press(&mut self, code: u8);

    /// Release a held key.
    fn release(&mut self, code: u8);

    /// Type a string.
    fn print(&mut self, text: &str);
}

/// Minimal HTTP client session.
///
/// A request is `begin`, optional `set_timeout`/`add_header`,
/// `send_request`, then `end`.
pub trait HttpTransport {
    /// Prepare a request to `url`. Returns false if it cannot be started.
    fn begin(&mut self, url: &str) -> bool;

    fn set_timeout(&mut self, timeout_ms: u32);

    fn add_header(&mut self, name: &str, value: &str);

    /// Perform the request. A positive value is the HTTP status code, zero or
    /// negative means the connection failed.
    fn send_request(&mut self, method: &str, body: Option<&str>) -> i32;

    /// Tear the session down.
    fn end(&mut self);
}

/// Source of raw button levels, one per physical key.
pub trait KeySampler {
    fn sample(&mut self) -> Result<[bool; KEY_COUNT]>;
}

/// Blocking pause between macro steps and action repetitions.
pub trait Sleeper: Send + Sync {
    fn pause(&self, ms: u32);
}

/// Sleeps the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn pause(&self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

pub type SharedKeyboard = Arc<Mutex<dyn KeyboardOutput + Send>>;
pub type SharedTransport = Arc<Mutex<dyn HttpTransport + Send>>;

/// Lock a collaborator, recovering the guard if a previous holder panicked.
pub fn lock_shared<T: ?Sized>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
