//! Integration tests for configuration loading.

use keypad::config::{
    ConfigLoader, ConfigSource, DirectorySource, MemorySource, ProfileConfig, parse_str,
};
use keypad::error::KeypadError;

use crate::common::fixtures::{ConfigDir, INVALID, MINIMAL, PROFILES};
use crate::common::init_test_logging;

fn memory_loader(text: &str) -> ConfigLoader {
    ConfigLoader::new(Box::new(MemorySource::with_config("memory", text)), None)
}

#[test]
fn minimal_document_resolves_through_fallback_scope() {
    init_test_logging();
    let mut loader = memory_loader(MINIMAL);
    loader.reload_config().unwrap();

    let config = loader.config();
    assert!(config.profiles.is_empty());
    assert!(config.active_profile().is_none());

    let scope = config.active_scope();
    let key = scope.key_for_event(1).unwrap();
    assert_eq!(key.id, "copy");
    let action = scope.find_action(&key.action_id).unwrap();
    assert_eq!(action.action_type, "hid_key");
    assert_eq!(action.payload, "CTRL+C");
}

#[test]
fn first_profile_is_active_when_unset() {
    init_test_logging();
    let mut loader = memory_loader(PROFILES);
    loader.reload_config().unwrap();

    let config = loader.config();
    assert_eq!(config.debounce_ms, 10);
    assert_eq!(config.active_profile().map(|p| p.id.as_str()), Some("work"));
    assert_eq!(config.active_scope().keys.len(), 4);
}

#[test]
fn profile_contents_parsed() {
    let root = parse_str(PROFILES).unwrap();
    let work: &ProfileConfig = root.find_profile("work").unwrap();

    let lights = work.scope().find_action("lights_on").unwrap();
    let request = lights.http_request.as_ref().unwrap();
    assert_eq!(request.method, "post");
    assert_eq!(request.retries, 2);
    assert_eq!(request.body, r#"{"on": true}"#);
    assert_eq!(request.headers["Content-Type"], "application/json");

    let combo = work.scope().find_action("greet_twice").unwrap();
    assert_eq!(combo.actions.len(), 2);
    assert_eq!(combo.actions[0].repeat, 2);
    assert_eq!(combo.actions[0].delay_ms, 40);

    let paste = work.scope().find_key("paste").unwrap();
    assert_eq!(paste.actions[0].id, "paste_macro");
}

#[test]
fn set_active_profile_switches_scope() {
    let mut loader = memory_loader(PROFILES);
    loader.reload_config().unwrap();

    loader.set_active_profile("gaming").unwrap();
    let config = loader.config();
    assert_eq!(config.active_scope().key_for_event(1).unwrap().id, "jump");

    let err = loader.set_active_profile("nope").unwrap_err();
    assert!(matches!(err, KeypadError::ProfileNotFound { .. }));
    assert_eq!(
        loader.config().active_profile().map(|p| p.id.as_str()),
        Some("gaming")
    );
}

#[test]
fn set_active_profile_without_profiles_fails() {
    let mut loader = memory_loader(MINIMAL);
    loader.reload_config().unwrap();
    assert!(matches!(
        loader.set_active_profile("work"),
        Err(KeypadError::NoProfiles)
    ));
}

#[test]
fn every_validation_error_is_reported() {
    init_test_logging();
    let mut loader = memory_loader(INVALID);
    let err = loader.reload_config().unwrap_err();

    let KeypadError::ConfigInvalid { errors } = err else {
        panic!("expected validation failure, got {err:?}");
    };
    for expected in [
        "config.version must be 1 (value=2)",
        "action.id values must be unique (duplicate=dup)",
        "action.type must be one of the supported values (value=teleport)",
        "key.action_id must reference a known action.id (key=k, action_id=missing)",
        "config.active_profile requires profiles",
    ] {
        assert!(
            errors.iter().any(|e| e == expected),
            "missing {expected:?} in {errors:#?}"
        );
    }
    assert_eq!(loader.last_error(), Some("Config validation failed"));
}

#[test]
fn unknown_active_profile_keeps_previous_config() {
    init_test_logging();
    let dir = ConfigDir::with_config(PROFILES);
    let mut loader = ConfigLoader::new(Box::new(DirectorySource::new("disk", dir.path())), None);
    loader.reload_config().unwrap();
    let before = loader.config();
    let digest = loader.provenance().unwrap().sha256.clone();

    dir.write(&PROFILES.replace("debounce_ms: 10", "debounce_ms: 10\n  active_profile: ghost"));
    let err = loader.reload_config().unwrap_err();

    assert!(matches!(err, KeypadError::ConfigInvalid { .. }));
    assert!(loader.diagnostics().iter().any(|d| d
        == "config.active_profile must reference an existing profile.id (value=ghost)"));
    assert_eq!(loader.config(), before);
    assert_eq!(loader.provenance().unwrap().sha256, digest);
}

#[test]
fn parse_error_reports_line_and_keeps_config() {
    let mut loader = memory_loader(MINIMAL);
    loader.reload_config().unwrap();

    let mut broken = memory_loader("keys:\n  - id: k\n    colour: red\n");
    let err = broken.reload_config().unwrap_err();
    match err {
        KeypadError::ConfigParse { line, message } => {
            assert_eq!(line, 3);
            assert!(message.contains("colour"), "{message}");
        }
        other => panic!("expected parse error, got {other:?}"),
    }
    assert_eq!(broken.last_error(), Some("Failed to parse /config.yaml"));
    assert!(broken.config().keys.is_empty());
}

#[test]
fn directory_sources_fall_back() {
    init_test_logging();
    let primary = ConfigDir::empty();
    let fallback = ConfigDir::with_config(MINIMAL);

    let mut loader = ConfigLoader::new(
        Box::new(DirectorySource::new("primary", primary.path())),
        Some(Box::new(DirectorySource::new("fallback", fallback.path())) as Box<dyn ConfigSource>),
    );
    loader.reload_config().unwrap();

    let provenance = loader.provenance().unwrap();
    assert_eq!(provenance.source, "fallback");
    assert_eq!(provenance.lines, MINIMAL.lines().count());
    assert_eq!(loader.diagnostics(), ["/config.yaml not found on primary"]);
}

#[test]
fn missing_primary_directory_is_diagnosed() {
    let fallback = ConfigDir::with_config(MINIMAL);
    let mut loader = ConfigLoader::new(
        Box::new(DirectorySource::new("primary", "/nonexistent/keypad-test")),
        Some(Box::new(DirectorySource::new("fallback", fallback.path())) as Box<dyn ConfigSource>),
    );
    loader.reload_config().unwrap();
    assert!(loader.diagnostics()[0].starts_with("primary unavailable"));
}

#[test]
fn same_text_same_digest() {
    let mut a = memory_loader(MINIMAL);
    let mut b = memory_loader(MINIMAL);
    let mut c = memory_loader(&MINIMAL.replace("Copy", "Copy it"));
    a.reload_config().unwrap();
    b.reload_config().unwrap();
    c.reload_config().unwrap();

    let digest = |loader: &ConfigLoader| loader.provenance().unwrap().sha256.clone();
    assert_eq!(digest(&a), digest(&b));
    assert_ne!(digest(&a), digest(&c));
}
