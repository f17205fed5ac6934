//! Test fixture helpers for configuration documents.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// Flat document: one key bound to one action, no profiles.
pub const MINIMAL: &str = "\
config:
  version: 1
keys:
  - id: copy
    label: Copy
    key_index: 1
    action_id: copy_keys
actions:
  - id: copy_keys
    type: hid_key
    payload: CTRL+C
";

/// Two profiles, `active_profile` unset, with macros, HTTP and composites.
pub const PROFILES: &str = "\
# Desk keypad
config:
  version: 1
  debounce_ms: 10
profiles:
  - id: work
    label: Work
    keys:
      - id: copy
        key_index: 1
        action_id: copy_macro
      - id: paste
        key_index: 2
        actions:
          - id: paste_macro
            type: macro
            payload: press:CTRL+V;release:CTRL+V
      - id: lights
        key_index: 5
        action_id: lights_on
      - id: combo
        key_index: 8
        action_id: greet_twice
    actions:
      - id: copy_macro
        type: macro
        steps:
          - press: CTRL+C
          - delay_ms: 15
          - release: CTRL+C
      - id: lights_on
        type: http_request
        url: http://lights.local/on
        method: post
        retries: 2
        headers:
          - Content-Type: application/json
        body: '{\"on\": true}'
      - id: greet_twice
        type: composite
        actions:
          - id: hello
            type: macro
            payload: text:hello
            repeat: 2
            delay_ms: 40
          - id: noop
            type: media
  - id: gaming
    label: Gaming
    keys:
      - id: jump
        key_index: 1
        actions:
          - id: space
            type: macro
            payload: press:SPACE
";

/// Parses, but fails validation in several ways at once.
pub const INVALID: &str = "\
config:
  version: 2
  active_profile: ghost
keys:
  - id: k
    key_index: 1
    action_id: missing
actions:
  - id: dup
    type: hid_key
  - id: dup
    type: teleport
";

/// A temporary directory holding `config.yaml`.
pub struct ConfigDir {
    pub dir: TempDir,
}

impl ConfigDir {
    /// # Panics
    ///
    /// Panics if the directory or file cannot be created.
    #[must_use]
    pub fn with_config(text: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(dir.path().join("config.yaml"), text).expect("Failed to write config.yaml");
        Self { dir }
    }

    /// An existing directory without `config.yaml`.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Replace `config.yaml`.
    pub fn write(&self, text: &str) {
        fs::write(self.dir.path().join("config.yaml"), text).expect("Failed to write config.yaml");
    }
}
