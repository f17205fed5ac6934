//! Integration tests for action dispatch through the public API.

use std::sync::{Arc, Mutex};

use keypad::actions::keys::{LEFT_CTRL, LEFT_SHIFT};
use keypad::actions::{ActionDispatcher, ActionRegistry, ActionStatus};
use keypad::config::{ActionConfig, ConfigLimits, parse_str};
use keypad::device::mock::{MockKeyboard, MockSleeper, MockTransport, Operation};

use crate::common::fixtures::PROFILES;
use crate::common::init_test_logging;

struct Harness {
    keyboard: Arc<Mutex<MockKeyboard>>,
    transport: Arc<Mutex<MockTransport>>,
    registry: ActionRegistry,
    sleeper: MockSleeper,
}

impl Harness {
    fn new(transport: MockTransport) -> Self {
        let keyboard = Arc::new(Mutex::new(MockKeyboard::new()));
        let transport = Arc::new(Mutex::new(transport));
        let registry = ActionRegistry::new()
            .with_keyboard(keyboard.clone())
            .with_http(transport.clone());
        Self {
            keyboard,
            transport,
            registry,
            sleeper: MockSleeper::new(),
        }
    }

    fn dispatcher(&self) -> ActionDispatcher<'_> {
        ActionDispatcher::new(&self.registry, &self.sleeper)
    }
}

#[test]
fn macro_steps_from_config_run_and_release() {
    init_test_logging();
    let root = parse_str(PROFILES).unwrap();
    let scope = root.active_scope();
    let harness = Harness::new(MockTransport::new());

    let status = harness
        .dispatcher()
        .dispatch_bound_key(&scope, scope.find_key("copy").unwrap());

    assert!(status.success);
    harness.keyboard.lock().unwrap().assert_operations(&[
        Operation::Press(LEFT_CTRL),
        Operation::Press(b'C'),
        Operation::Release(LEFT_CTRL),
        Operation::Release(b'C'),
    ]);
    assert_eq!(harness.sleeper.pauses(), vec![15]);
}

#[test]
fn http_action_retries_then_succeeds() {
    init_test_logging();
    let root = parse_str(PROFILES).unwrap();
    let scope = root.active_scope();
    let harness = Harness::new(MockTransport::new().with_statuses([-1, -1, 200]));

    let status = harness
        .dispatcher()
        .dispatch_bound_key(&scope, scope.find_key("lights").unwrap());

    assert_eq!(status, ActionStatus::ok_with(200, "ok"));
    let transport = harness.transport.lock().unwrap();
    assert_eq!(transport.send_count(), 3);
    transport.assert_contains(&Operation::Send {
        method: "POST".to_string(),
        body: Some(r#"{"on": true}"#.to_string()),
    });
    transport.assert_contains(&Operation::AddHeader(
        "Content-Type".to_string(),
        "application/json".to_string(),
    ));
}

#[test]
fn composite_repeats_children_with_delay() {
    let root = parse_str(PROFILES).unwrap();
    let scope = root.active_scope();
    let harness = Harness::new(MockTransport::new());

    let status = harness
        .dispatcher()
        .dispatch_bound_key(&scope, scope.find_key("combo").unwrap());

    assert!(status.success);
    assert_eq!(harness.keyboard.lock().unwrap().typed(), "hellohello");
    assert_eq!(harness.sleeper.pauses(), vec![40, 40]);
}

#[test]
fn failing_http_stops_the_key() {
    let harness = Harness::new(MockTransport::new().with_statuses([404]));
    let actions = vec![
        ActionConfig::new("call", "http_request").with_payload("url: http://x.local"),
        ActionConfig::new("after", "macro").with_payload("text:never"),
    ];

    let status = harness.dispatcher().dispatch_actions(&actions);

    assert_eq!(status, ActionStatus::failure(404, "http_request failed"));
    assert!(harness.keyboard.lock().unwrap().operations().is_empty());
}

#[test]
fn limits_clamp_at_dispatch_time() {
    let harness = Harness::new(MockTransport::new());
    let limits = ConfigLimits {
        max_action_repeat: 3,
        max_action_delay_ms: 100,
        ..ConfigLimits::default()
    };
    let action = ActionConfig::new("spam", "macro")
        .with_payload("text:x")
        .with_repeat(1_000)
        .with_delay_ms(60_000);

    let status = harness.dispatcher().with_limits(limits).dispatch_action(&action);

    assert!(status.success);
    assert_eq!(harness.keyboard.lock().unwrap().typed(), "xxx");
    assert_eq!(harness.sleeper.pauses(), vec![100, 100, 100]);
}

#[test]
fn macro_payload_with_modifiers() {
    let harness = Harness::new(MockTransport::new());
    let action = ActionConfig::new("shout", "macro")
        .with_payload("press:SHIFT | text:hi | release:SHIFT | press:ctrl+a");

    assert!(harness.dispatcher().dispatch_action(&action).success);

    let keyboard = harness.keyboard.lock().unwrap();
    assert!(keyboard.held().is_empty());
    keyboard.assert_operations(&[
        Operation::Press(LEFT_SHIFT),
        Operation::Print("hi".to_string()),
        Operation::Release(LEFT_SHIFT),
        Operation::Press(LEFT_CTRL),
        Operation::Press(b'a'),
        Operation::Release(b'a'),
        Operation::Release(LEFT_CTRL),
    ]);
}

#[test]
fn payload_url_with_header_block_sends() {
    let root = parse_str(
        "actions:\n  - id: hook\n    type: http_request\n    payload: \"url: http://a.local/x\"\n    headers:\n      - X-Token: abc\n",
    )
    .unwrap();
    assert!(root.validate().ok());
    let harness = Harness::new(MockTransport::new().with_statuses([200]));

    let status = harness
        .dispatcher()
        .dispatch_action(root.fallback_scope().find_action("hook").unwrap());

    assert_eq!(status, ActionStatus::ok_with(200, "ok"));
    let transport = harness.transport.lock().unwrap();
    assert_eq!(transport.send_count(), 1);
    transport.assert_contains(&Operation::AddHeader(
        "X-Token".to_string(),
        "abc".to_string(),
    ));
}
