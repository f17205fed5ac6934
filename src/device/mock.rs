//! Recording doubles for the device traits.
//!
//! Each mock logs every call as an [`Operation`] so tests can assert on the
//! exact sequence the core produced.
//!
//! # Example
//!
//! ```rust,ignore
//! use keypad::device::KeyboardOutput;
//! use keypad::device::mock::{MockKeyboard, Operation};
//!
//! let mut keyboard = MockKeyboard::new();
//! keyboard.press(0x80);
//! keyboard.release(0x80);
//!
//! keyboard.assert_operations(&[Operation::Press(0x80), Operation::Release(0x80)]);
//! assert!(keyboard.held().is_empty());
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::sync::Mutex;

use tracing::trace;

use super::{HttpTransport, KeySampler, KeyboardOutput, Sleeper, lock_shared};
use crate::chord::KEY_COUNT;
use crate::error::{KeypadError, Result};

/// Recorded call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Press(u8),
    Release(u8),
    Print(String),
    Begin(String),
    SetTimeout(u32),
    AddHeader(String, String),
    Send {
        method: String,
        body: Option<String>,
    },
    End,
    Pause(u32),
}

fn assert_log(actual: &[Operation], expected: &[Operation]) {
    assert_eq!(
        actual, expected,
        "Operation mismatch.\nExpected: {expected:#?}\nActual: {actual:#?}",
    );
}

/// Keyboard double that also tracks which keys are currently held.
#[derive(Debug, Default)]
pub struct MockKeyboard {
    log: Vec<Operation>,
    held: BTreeSet<u8>,
}

impl MockKeyboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.log.clone()
    }

    /// Keys pressed and not yet released.
    #[must_use]
    pub const fn held(&self) -> &BTreeSet<u8> {
        &self.held
    }

    /// Concatenation of every printed string.
    #[must_use]
    pub fn typed(&self) -> String {
        self.log
            .iter()
            .filter_map(|op| match op {
                Operation::Print(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// # Panics
    ///
    /// Panics if the recorded operations differ from `expected`.
    pub fn assert_operations(&self, expected: &[Operation]) {
        assert_log(&self.log, expected);
    }

    pub fn clear_operations(&mut self) {
        self.log.clear();
    }

    fn record(&mut self, op: Operation) {
        trace!(?op, "Recording keyboard operation");
        self.log.push(op);
    }
}

impl KeyboardOutput for MockKeyboard {
    fn press(&mut self, code: u8) {
        self.held.insert(code);
        self.record(Operation::Press(code));
    }

    fn release(&mut self, code: u8) {
        self.held.remove(&code);
        self.record(Operation::Release(code));
    }

    fn print(&mut self, text: &str) {
        self.record(Operation::Print(text.to_string()));
    }
}

/// Transport double answering with scripted results.
///
/// `send_request` pops the next scripted status, falling back to
/// `default_status` once the script is exhausted. `begin` likewise pops from
/// its own script and succeeds by default.
#[derive(Debug)]
pub struct MockTransport {
    log: Vec<Operation>,
    statuses: VecDeque<i32>,
    begin_results: VecDeque<bool>,
    default_status: i32,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            log: Vec::new(),
            statuses: VecDeque::new(),
            begin_results: VecDeque::new(),
            default_status: 200,
        }
    }
}

impl MockTransport {
    /// Every request answers 200.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with `statuses` in order, then with the default.
    #[must_use]
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = i32>) -> Self {
        self.statuses.extend(statuses);
        self
    }

    /// Outcomes for successive `begin` calls, then success.
    #[must_use]
    pub fn with_begin_results(mut self, results: impl IntoIterator<Item = bool>) -> Self {
        self.begin_results.extend(results);
        self
    }

    #[must_use]
    pub const fn with_default_status(mut self, status: i32) -> Self {
        self.default_status = status;
        self
    }

    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.log.clone()
    }

    /// Number of `send_request` calls.
    #[must_use]
    pub fn send_count(&self) -> usize {
        self.log
            .iter()
            .filter(|op| matches!(op, Operation::Send { .. }))
            .count()
    }

    /// Number of `begin` calls.
    #[must_use]
    pub fn begin_count(&self) -> usize {
        self.log
            .iter()
            .filter(|op| matches!(op, Operation::Begin(_)))
            .count()
    }

    /// # Panics
    ///
    /// Panics if the recorded operations differ from `expected`.
    pub fn assert_operations(&self, expected: &[Operation]) {
        assert_log(&self.log, expected);
    }

    /// # Panics
    ///
    /// Panics if `expected` was never recorded.
    pub fn assert_contains(&self, expected: &Operation) {
        assert!(
            self.log.contains(expected),
            "Expected operation {expected:?} not found in: {:#?}",
            self.log
        );
    }

    fn record(&mut self, op: Operation) {
        trace!(?op, "Recording transport operation");
        self.log.push(op);
    }
}

impl HttpTransport for MockTransport {
    fn begin(&mut self, url: &str) -> bool {
        self.record(Operation::Begin(url.to_string()));
        self.begin_results.pop_front().unwrap_or(true)
    }

    fn set_timeout(&mut self, timeout_ms: u32) {
        self.record(Operation::SetTimeout(timeout_ms));
    }

    fn add_header(&mut self, name: &str, value: &str) {
        self.record(Operation::AddHeader(name.to_string(), value.to_string()));
    }

    fn send_request(&mut self, method: &str, body: Option<&str>) -> i32 {
        self.record(Operation::Send {
            method: method.to_string(),
            body: body.map(str::to_string),
        });
        self.statuses.pop_front().unwrap_or(self.default_status)
    }

    fn end(&mut self) {
        self.record(Operation::End);
    }
}

/// Sampler double replaying queued button levels.
///
/// When the queue runs dry the last sample is repeated.
#[derive(Debug, Default)]
pub struct MockSampler {
    queue: VecDeque<[bool; KEY_COUNT]>,
    last: [bool; KEY_COUNT],
    fail_when_empty: bool,
}

impl MockSampler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue samples, each repeated for `ticks` polls.
    #[must_use]
    pub fn hold(mut self, sample: [bool; KEY_COUNT], ticks: usize) -> Self {
        self.queue.extend(std::iter::repeat_n(sample, ticks));
        self
    }

    /// Return a device error once the queue is exhausted.
    #[must_use]
    pub const fn fail_when_empty(mut self) -> Self {
        self.fail_when_empty = true;
        self
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl KeySampler for MockSampler {
    fn sample(&mut self) -> Result<[bool; KEY_COUNT]> {
        match self.queue.pop_front() {
            Some(sample) => {
                self.last = sample;
                Ok(sample)
            }
            None if self.fail_when_empty => Err(KeypadError::DeviceCommunication(
                "Mock sampler exhausted".to_string(),
            )),
            None => Ok(self.last),
        }
    }
}

/// Sleeper double that records pauses instead of sleeping.
#[derive(Debug, Default)]
pub struct MockSleeper {
    pauses: Mutex<Vec<u32>>,
}

impl MockSleeper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pauses(&self) -> Vec<u32> {
        lock_shared(&self.pauses).clone()
    }

    #[must_use]
    pub fn total_ms(&self) -> u64 {
        lock_shared(&self.pauses).iter().map(|&ms| u64::from(ms)).sum()
    }
}

impl Sleeper for MockSleeper {
    fn pause(&self, ms: u32) {
        trace!(ms, "Recording pause");
        lock_shared(&self.pauses).push(ms);
    }
}
