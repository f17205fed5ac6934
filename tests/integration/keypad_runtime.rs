//! Integration tests for the keypad control loop.

use std::sync::{Arc, Mutex};

use keypad::actions::ActionRegistry;
use keypad::chord::KEY_COUNT;
use keypad::config::{ConfigLoader, DirectorySource};
use keypad::device::mock::{MockKeyboard, MockSampler, MockSleeper, MockTransport};
use keypad::runtime::{Keypad, RunOptions};

use crate::common::fixtures::{ConfigDir, MINIMAL, PROFILES};
use crate::common::init_test_logging;

const IDLE: [bool; KEY_COUNT] = [false; KEY_COUNT];
const FIRST: [bool; KEY_COUNT] = [true, false, false, false];
const ALL: [bool; KEY_COUNT] = [true; KEY_COUNT];

fn keypad_for(dir: &ConfigDir, keyboard: Arc<Mutex<MockKeyboard>>) -> Keypad {
    let loader = ConfigLoader::new(Box::new(DirectorySource::new("disk", dir.path())), None);
    let registry = ActionRegistry::new()
        .with_keyboard(keyboard)
        .with_http(Arc::new(Mutex::new(MockTransport::new())));
    let mut keypad = Keypad::new(loader, registry, Box::new(MockSleeper::new()));
    keypad.reload().unwrap();
    keypad
}

#[test]
fn chord_press_runs_bound_key() {
    init_test_logging();
    let dir = ConfigDir::with_config(PROFILES);
    let keyboard = Arc::new(Mutex::new(MockKeyboard::new()));
    let mut keypad = keypad_for(&dir, keyboard.clone());

    assert!(keypad.poll(ALL, 0).is_none());
    let event = keypad.poll(ALL, 10).unwrap();
    assert_eq!(event.event_id, 8);
    assert_eq!(event.key.as_deref(), Some("combo"));
    assert!(event.status.success);
    assert_eq!(keyboard.lock().unwrap().typed(), "hellohello");

    assert!(keypad.poll(ALL, 500).is_none());
}

#[test]
fn profile_switch_changes_binding() {
    let dir = ConfigDir::with_config(PROFILES);
    let keyboard = Arc::new(Mutex::new(MockKeyboard::new()));
    let mut keypad = keypad_for(&dir, keyboard.clone());
    keypad.set_active_profile("gaming").unwrap();

    keypad.poll(FIRST, 0);
    let event = keypad.poll(FIRST, 10).unwrap();

    assert_eq!(event.key.as_deref(), Some("jump"));
    let keyboard = keyboard.lock().unwrap();
    assert_eq!(keyboard.operations().len(), 2);
    assert!(keyboard.held().is_empty());
}

#[test]
fn reload_picks_up_new_document() {
    let dir = ConfigDir::with_config(MINIMAL);
    let mut keypad = keypad_for(&dir, Arc::new(Mutex::new(MockKeyboard::new())));
    assert_eq!(keypad.mapper().debounce_ms(), 30);
    assert!(keypad.handle_key("copy").is_ok());

    dir.write(PROFILES);
    keypad.reload().unwrap();

    assert_eq!(keypad.mapper().debounce_ms(), 10);
    assert!(keypad.handle_key("lights").is_ok());
    assert_eq!(keypad.loader().provenance().unwrap().source, "disk");
}

#[test]
fn broken_reload_keeps_running_config() {
    let dir = ConfigDir::with_config(PROFILES);
    let mut keypad = keypad_for(&dir, Arc::new(Mutex::new(MockKeyboard::new())));

    dir.write("config:\n  version: 1\nkeys:\n  - id: k\n    key_index: eleven\n");
    assert!(keypad.reload().is_err());
    assert_eq!(
        keypad.loader().last_error(),
        Some("Failed to parse /config.yaml")
    );
    assert_eq!(keypad.mapper().debounce_ms(), 10);
    assert!(keypad.handle_key("copy").is_ok());
}

#[test]
fn run_loop_dispatches_from_sampler() {
    init_test_logging();
    let dir = ConfigDir::with_config(&MINIMAL.replace("version: 1", "version: 1\n  debounce_ms: 0"));
    let mut keypad = keypad_for(&dir, Arc::new(Mutex::new(MockKeyboard::new())));
    let mut sampler = MockSampler::new()
        .hold(IDLE, 3)
        .hold(FIRST, 3)
        .hold(IDLE, 3)
        .fail_when_empty();

    let options = RunOptions {
        poll_interval_ms: 1,
        max_events: Some(1),
        ..RunOptions::default()
    };
    let mut keys = Vec::new();
    let handled = keypad
        .run(&mut sampler, options, |event| keys.push(event.key.clone()))
        .unwrap();

    assert_eq!(handled, 1);
    assert_eq!(keys, vec![Some("copy".to_string())]);
    assert_eq!(sampler.remaining(), 5);
}

#[test]
fn held_chord_survives_profile_switch() {
    let dir = ConfigDir::with_config(PROFILES);
    let keyboard = Arc::new(Mutex::new(MockKeyboard::new()));
    let mut keypad = keypad_for(&dir, keyboard.clone());

    keypad.poll(FIRST, 0);
    assert_eq!(keypad.poll(FIRST, 10).unwrap().key.as_deref(), Some("copy"));

    keypad.set_active_profile("gaming").unwrap();
    assert!(keypad.poll(FIRST, 20).is_none());
    assert!(keypad.poll(FIRST, 200).is_none());

    keypad.poll(IDLE, 210);
    keypad.poll(IDLE, 220);
    keypad.poll(FIRST, 230);
    let event = keypad.poll(FIRST, 240).unwrap();
    assert_eq!(event.key.as_deref(), Some("jump"));
}
