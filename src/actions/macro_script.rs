//! Keystroke macro scripts.
//!
//! A script is a sequence of steps separated by `;`, `|` or newlines:
//!
//! ```text
//! press:CTRL+SHIFT+T; delay_ms:50; release:CTRL+SHIFT+T | text:hello
//! ```
//!
//! Step names are case-insensitive and may be written as YAML list items
//! (`- press: CTRL`). Anything malformed is skipped with a warning so one bad
//! step does not cancel the rest of the macro.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, warn};

use super::keys::{resolve_key, split_keys};
use crate::config::parser::{parse_u32, strip_quotes};
use crate::config::{ConfigLimits, MacroStep};
use crate::device::{KeyboardOutput, Sleeper};

/// Parse a payload script. Delays above `max_macro_delay_ms` are dropped.
#[must_use]
pub fn parse_macro_script(payload: &str, limits: &ConfigLimits) -> Vec<MacroStep> {
    let mut steps = Vec::new();
    for raw in payload.split([';', '\n', '|']) {
        let mut entry = raw.trim();
        if entry.is_empty() {
            continue;
        }
        if let Some(rest) = entry.strip_prefix('-') {
            entry = rest.trim();
        }
        let Some((name, value)) = entry.split_once(':') else {
            warn!(step = entry, "Malformed macro step");
            continue;
        };
        let value = strip_quotes(value.trim());

        let step = match name.trim().to_ascii_uppercase().as_str() {
            "PRESS" => MacroStep::Press(value.to_string()),
            "RELEASE" => MacroStep::Release(value.to_string()),
            "TEXT" => MacroStep::Text(value.to_string()),
            "DELAY_MS" | "DELAY" => match parse_u32(value) {
                Some(ms) if ms <= limits.max_macro_delay_ms => MacroStep::Delay(ms),
                _ => {
                    warn!(
                        value,
                        max = limits.max_macro_delay_ms,
                        "Invalid macro delay"
                    );
                    continue;
                }
            },
            other => {
                warn!(step = other, "Unknown macro step");
                continue;
            }
        };
        steps.push(step);
    }
    steps
}

/// What a macro run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MacroReport {
    pub steps_run: usize,
    /// Key names that could not be resolved and were skipped.
    pub unresolved: Vec<String>,
}

/// Keys pressed during one macro run. Dropping the guard releases them all.
struct HeldKeys<'k> {
    keyboard: &'k mut dyn KeyboardOutput,
    held: BTreeSet<u8>,
}

impl HeldKeys<'_> {
    fn press(&mut self, code: u8) {
        self.keyboard.press(code);
        self.held.insert(code);
    }

    fn release(&mut self, code: u8) {
        self.keyboard.release(code);
        self.held.remove(&code);
    }
}

impl Drop for HeldKeys<'_> {
    fn drop(&mut self) {
        for code in std::mem::take(&mut self.held) {
            self.keyboard.release(code);
        }
    }
}

/// Run `steps` against `keyboard`. Every key still held at the end is released,
/// including when a step panics.
pub fn run_macro(
    steps: &[MacroStep],
    keyboard: &mut dyn KeyboardOutput,
    sleeper: &dyn Sleeper,
    limits: &ConfigLimits,
) -> MacroReport {
    let mut report = MacroReport::default();
    let mut keys = HeldKeys {
        keyboard,
        held: BTreeSet::new(),
    };

    for step in steps {
        match step {
            MacroStep::Press(names) | MacroStep::Release(names) => {
                let pressing = matches!(step, MacroStep::Press(_));
                for name in split_keys(names) {
                    let Some(code) = resolve_key(name) else {
                        warn!(key = name, "Unknown macro key");
                        report.unresolved.push(name.to_string());
                        continue;
                    };
                    if pressing {
                        keys.press(code);
                    } else {
                        keys.release(code);
                    }
                }
            }
            MacroStep::Text(text) => keys.keyboard.print(text),
            MacroStep::Delay(ms) => {
                let ms = if *ms > limits.max_macro_delay_ms {
                    warn!(
                        delay_ms = *ms,
                        max = limits.max_macro_delay_ms,
                        "Clamping macro delay"
                    );
                    limits.max_macro_delay_ms
                } else {
                    *ms
                };
                if ms > 0 {
                    sleeper.pause(ms);
                }
            }
        }
        report.steps_run += 1;
    }

    debug!(
        steps = report.steps_run,
        still_held = keys.held.len(),
        "Macro finished"
    );
    report
}
