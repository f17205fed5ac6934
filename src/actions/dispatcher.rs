//! Walks keys and action trees, applying enable flags, repeat and delay.

use tracing::{debug, instrument, warn};

use super::registry::ActionRegistry;
use super::status::ActionStatus;
use crate::config::{ActionConfig, ConfigLimits, KeyConfig, Scope};
use crate::device::Sleeper;

/// Executes actions through a registry.
///
/// Values above [`ConfigLimits`] are clamped here rather than rejected, so
/// trees built in code behave the same as trees the loader accepted.
#[derive(Clone, Copy)]
pub struct ActionDispatcher<'r> {
    registry: &'r ActionRegistry,
    sleeper: &'r dyn Sleeper,
    limits: ConfigLimits,
}

impl std::fmt::Debug for ActionDispatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("registry", self.registry)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl<'r> ActionDispatcher<'r> {
    #[must_use]
    pub fn new(registry: &'r ActionRegistry, sleeper: &'r dyn Sleeper) -> Self {
        Self {
            registry,
            sleeper,
            limits: ConfigLimits::default(),
        }
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: ConfigLimits) -> Self {
        self.limits = limits;
        self
    }

    pub const fn limits(&self) -> &ConfigLimits {
        &self.limits
    }

    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper
    }

    /// Run a key's inline actions.
    pub fn dispatch_key(&self, key: &KeyConfig) -> ActionStatus {
        if !key.enabled {
            debug!(key = %key.id, "Key disabled");
            return ActionStatus::ok();
        }
        self.dispatch_actions(&key.actions)
    }

    /// Run the action a key references through `action_id`, then its inline
    /// actions. A dangling reference is skipped.
    #[instrument(skip_all, fields(key = %key.id))]
    pub fn dispatch_bound_key(&self, scope: &Scope<'_>, key: &KeyConfig) -> ActionStatus {
        if !key.enabled {
            debug!("Key disabled");
            return ActionStatus::ok();
        }
        if !key.action_id.is_empty() {
            match scope.find_action(&key.action_id) {
                Some(action) => {
                    let status = self.dispatch_action(action);
                    if !status.success {
                        return status;
                    }
                }
                None => warn!(action_id = %key.action_id, "Key references unknown action"),
            }
        }
        self.dispatch_actions(&key.actions)
    }

    /// Run `actions` in order, stopping at the first failure.
    pub fn dispatch_actions(&self, actions: &[ActionConfig]) -> ActionStatus {
        for action in actions {
            let status = self.dispatch_action(action);
            if !status.success {
                return status;
            }
        }
        ActionStatus::ok()
    }

    /// Run one action `repeat` times, pausing `delay_ms` after each run.
    #[instrument(skip_all, fields(action = action.label(), r#type = %action.action_type))]
    pub fn dispatch_action(&self, action: &ActionConfig) -> ActionStatus {
        if !action.enabled {
            debug!("Action disabled");
            return ActionStatus::ok();
        }

        let problems = action.validate_structure();
        if !problems.ok() {
            warn!(errors = ?problems.errors, "Skipping invalid action");
            return ActionStatus::ok();
        }

        let repeat = match action.repeat {
            0 => 1,
            n if n > self.limits.max_action_repeat => {
                warn!(
                    repeat = n,
                    max = self.limits.max_action_repeat,
                    "Clamping repeat"
                );
                self.limits.max_action_repeat
            }
            n => n,
        };
        let delay_ms = if action.delay_ms > self.limits.max_action_delay_ms {
            warn!(
                delay_ms = action.delay_ms,
                max = self.limits.max_action_delay_ms,
                "Clamping delay"
            );
            self.limits.max_action_delay_ms
        } else {
            action.delay_ms
        };

        let mut status = ActionStatus::ok();
        for run in 0..repeat {
            status = self.registry.dispatch(action, self);
            if !status.success {
                warn!(
                    run,
                    code = status.status_code,
                    message = %status.message,
                    "Action failed"
                );
                return status;
            }
            if delay_ms > 0 {
                self.sleeper.pause(delay_ms);
            }
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockSleeper;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Registry whose `hid_key` handler counts invocations.
    fn counting_registry() -> (ActionRegistry, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = ActionRegistry::new();
        registry.register("hid_key", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            ActionStatus::ok()
        });
        (registry, calls)
    }

    #[test]
    fn test_repeat_zero_runs_once() {
        let (registry, calls) = counting_registry();
        let sleeper = MockSleeper::new();
        let dispatcher = ActionDispatcher::new(&registry, &sleeper);

        let status = dispatcher.dispatch_action(&ActionConfig::new("a", "hid_key").with_repeat(0));

        assert!(status.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeat_clamped_to_max() {
        let (registry, calls) = counting_registry();
        let sleeper = MockSleeper::new();
        let limits = ConfigLimits {
            max_action_repeat: 4,
            ..ConfigLimits::default()
        };
        let dispatcher = ActionDispatcher::new(&registry, &sleeper).with_limits(limits);

        dispatcher.dispatch_action(&ActionConfig::new("a", "hid_key").with_repeat(100));

        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_delay_after_each_repetition_and_clamped() {
        let (registry, _) = counting_registry();
        let sleeper = MockSleeper::new();
        let limits = ConfigLimits {
            max_action_delay_ms: 200,
            ..ConfigLimits::default()
        };
        let dispatcher = ActionDispatcher::new(&registry, &sleeper).with_limits(limits);

        let action = ActionConfig::new("a", "hid_key")
            .with_repeat(3)
            .with_delay_ms(5_000);
        dispatcher.dispatch_action(&action);

        assert_eq!(sleeper.pauses(), vec![200, 200, 200]);
    }

    #[test]
    fn test_disabled_and_invalid_are_skipped() {
        let (registry, calls) = counting_registry();
        let sleeper = MockSleeper::new();
        let dispatcher = ActionDispatcher::new(&registry, &sleeper);

        assert!(dispatcher.dispatch_action(&ActionConfig::new("a", "hid_key").disabled()).success);
        assert!(dispatcher.dispatch_action(&ActionConfig::new("", "hid_key")).success);
        assert!(dispatcher.dispatch_action(&ActionConfig::new("a", "teleport")).success);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_composite_recurses() {
        let (registry, calls) = counting_registry();
        let sleeper = MockSleeper::new();
        let dispatcher = ActionDispatcher::new(&registry, &sleeper);

        let inner = ActionConfig::new("inner", "composite")
            .with_children(vec![ActionConfig::new("c", "hid_key").with_repeat(2)]);
        let outer = ActionConfig::new("outer", "composite").with_children(vec![
            ActionConfig::new("a", "hid_key"),
            ActionConfig::new("b", "hid_key").disabled(),
            inner,
        ]);

        assert!(dispatcher.dispatch_action(&outer).success);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_list_stops_at_first_failure() {
        let (mut registry, calls) = counting_registry();
        registry.register("system", |_, _| ActionStatus::failure(3, "boom"));
        let sleeper = MockSleeper::new();
        let dispatcher = ActionDispatcher::new(&registry, &sleeper);

        let status = dispatcher.dispatch_actions(&[
            ActionConfig::new("a", "hid_key"),
            ActionConfig::new("b", "system").with_repeat(5),
            ActionConfig::new("c", "hid_key"),
        ]);

        assert_eq!(status, ActionStatus::failure(3, "boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_list_succeeds() {
        let registry = ActionRegistry::new();
        let sleeper = MockSleeper::new();
        let dispatcher = ActionDispatcher::new(&registry, &sleeper);
        assert_eq!(dispatcher.dispatch_actions(&[]), ActionStatus::ok());
    }

    #[test]
    fn test_disabled_key() {
        let (registry, calls) = counting_registry();
        let sleeper = MockSleeper::new();
        let dispatcher = ActionDispatcher::new(&registry, &sleeper);

        let mut key = KeyConfig::new("k", 1);
        key.actions.push(ActionConfig::new("a", "hid_key"));
        key.enabled = false;

        assert!(dispatcher.dispatch_key(&key).success);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        key.enabled = true;
        assert!(dispatcher.dispatch_key(&key).success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bound_key_runs_reference_then_inline() {
        let (registry, calls) = counting_registry();
        let sleeper = MockSleeper::new();
        let dispatcher = ActionDispatcher::new(&registry, &sleeper);

        let actions = vec![ActionConfig::new("copy", "hid_key").with_repeat(2)];
        let mut key = KeyConfig::new("k", 1);
        key.action_id = "copy".to_string();
        key.actions.push(ActionConfig::new("extra", "hid_key"));
        let keys = vec![key];
        let scope = Scope {
            keys: &keys,
            actions: &actions,
        };

        assert!(dispatcher.dispatch_bound_key(&scope, &keys[0]).success);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
