//! The keypad control loop: samples in, dispatched actions out.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::actions::{ActionDispatcher, ActionRegistry, ActionStatus};
use crate::chord::{ChordMapper, EventId, KEY_COUNT};
use crate::config::{ConfigLoader, KeyConfig, Scope};
use crate::device::{KeySampler, Sleeper};
use crate::error::{KeypadError, Result};

/// Outcome of one chord event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyEvent {
    pub event_id: EventId,
    /// Id of the key bound to the event, if any.
    pub key: Option<String>,
    pub status: ActionStatus,
    pub timestamp: DateTime<Utc>,
}

/// Limits for [`Keypad::run`].
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Pause between samples.
    pub poll_interval_ms: u32,
    /// Stop after this long.
    pub timeout: Option<Duration>,
    /// Stop after this many events.
    pub max_events: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5,
            timeout: None,
            max_events: None,
        }
    }
}

/// Owns the configuration, the chord mapper and the action registry.
pub struct Keypad {
    loader: ConfigLoader,
    mapper: ChordMapper,
    registry: ActionRegistry,
    sleeper: Box<dyn Sleeper>,
}

impl std::fmt::Debug for Keypad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypad")
            .field("loader", &self.loader)
            .field("mapper", &self.mapper)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Keypad {
    /// Build a keypad around an already loaded (or empty) configuration.
    pub fn new(loader: ConfigLoader, registry: ActionRegistry, sleeper: Box<dyn Sleeper>) -> Self {
        let mapper = ChordMapper::new(loader.config().debounce_ms);
        Self {
            loader,
            mapper,
            registry,
            sleeper,
        }
    }

    pub const fn loader(&self) -> &ConfigLoader {
        &self.loader
    }

    pub const fn mapper(&self) -> &ChordMapper {
        &self.mapper
    }

    pub const fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Reload the configuration and adopt its debounce window.
    ///
    /// On failure the previous configuration and window stay in effect.
    pub fn reload(&mut self) -> Result<()> {
        self.loader.reload_config()?;
        let debounce_ms = self.loader.config().debounce_ms;
        if debounce_ms != self.mapper.debounce_ms() {
            debug!(debounce_ms, "Debounce window updated");
            self.mapper.set_debounce_ms(debounce_ms);
        }
        Ok(())
    }

    /// Switch profiles. A chord held across the switch does not fire again
    /// until it is released.
    pub fn set_active_profile(&mut self, profile_id: &str) -> Result<()> {
        self.loader.set_active_profile(profile_id)?;
        Ok(())
    }

    /// Feed one sample. Returns the dispatched event, if the sample completed one.
    pub fn poll(&mut self, sample: [bool; KEY_COUNT], now_ms: u32) -> Option<KeyEvent> {
        let event_id = self.mapper.update(sample, now_ms)?;
        Some(self.handle_event(event_id))
    }

    /// Dispatch the key bound to `event_id` in the active scope.
    #[instrument(skip(self))]
    pub fn handle_event(&self, event_id: EventId) -> KeyEvent {
        let config = self.loader.config();
        let scope = config.active_scope();
        let key = scope.key_for_event(event_id);
        if key.is_none() {
            debug!("No key bound to event");
        }
        self.dispatch(event_id, &scope, key)
    }

    /// Dispatch a key by id, as if its chord had fired.
    pub fn handle_key(&self, key_id: &str) -> Result<KeyEvent> {
        let config = self.loader.config();
        let scope = config.active_scope();
        let key = scope.find_key(key_id).ok_or_else(|| KeypadError::KeyNotFound {
            id: key_id.to_string(),
        })?;
        Ok(self.dispatch(key.key_index, &scope, Some(key)))
    }

    fn dispatch(&self, event_id: EventId, scope: &Scope<'_>, key: Option<&KeyConfig>) -> KeyEvent {
        let dispatcher = ActionDispatcher::new(&self.registry, self.sleeper.as_ref())
            .with_limits(*self.loader.limits());

        let (key, status) = match key {
            Some(key) => (
                Some(key.id.clone()),
                dispatcher.dispatch_bound_key(scope, key),
            ),
            None => (None, ActionStatus::ok()),
        };
        if !status.success {
            warn!(
                key = key.as_deref().unwrap_or_default(),
                code = status.status_code,
                message = %status.message,
                "Key dispatch failed"
            );
        }
        KeyEvent {
            event_id,
            key,
            status,
            timestamp: Utc::now(),
        }
    }

    /// Poll `sampler` until the timeout or event limit is reached.
    ///
    /// Returns the number of events handled. Sampler errors end the loop.
    pub fn run(
        &mut self,
        sampler: &mut dyn KeySampler,
        options: RunOptions,
        mut on_event: impl FnMut(&KeyEvent),
    ) -> Result<usize> {
        let start = Instant::now();
        let mut handled = 0;
        info!(
            debounce_ms = self.mapper.debounce_ms(),
            poll_interval_ms = options.poll_interval_ms,
            "Keypad loop started"
        );

        loop {
            if let Some(timeout) = options.timeout {
                if start.elapsed() >= timeout {
                    break;
                }
            }

            let sample = sampler.sample()?;
            if let Some(event) = self.poll(sample, wrapping_millis(start)) {
                on_event(&event);
                handled += 1;
                if options.max_events.is_some_and(|max| handled >= max) {
                    break;
                }
            }

            if options.poll_interval_ms > 0 {
                self.sleeper.pause(options.poll_interval_ms);
            }
        }

        info!(events = handled, "Keypad loop stopped");
        Ok(handled)
    }
}

/// Milliseconds since `start`, wrapping like a 32-bit tick counter.
#[allow(clippy::cast_possible_truncation)]
fn wrapping_millis(start: Instant) -> u32 {
    start.elapsed().as_millis() as u32
}
