//! Data types describing a keypad configuration, plus validation.
//!
//! The tree is `ConfigRoot` → `ProfileConfig` → (`KeyConfig`, `ActionConfig`),
//! where actions nest recursively through [`ActionConfig::actions`]. Validation
//! never stops at the first problem: every node returns a [`ValidationResult`]
//! holding all violations found, in declaration order.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// The only configuration format version understood by this crate.
pub const SUPPORTED_VERSION: u32 = 1;

/// Action `type` tags accepted by validation.
pub const ACTION_TYPES: &[&str] = &[
    "hid_key",
    "ble_key",
    "http_request",
    "composite",
    "macro",
    "media",
    "keycode",
    "layer",
    "system",
    "custom",
    "profile_switch",
];

/// Upper bounds applied to configured quantities.
///
/// Exceeding a bound is a validation error when a configuration is loaded;
/// the dispatcher clamps the same quantities instead of rejecting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigLimits {
    pub max_action_delay_ms: u32,
    pub max_action_repeat: u32,
    pub max_macro_payload_length: usize,
    pub max_http_retries: u32,
    pub max_macro_delay_ms: u32,
}

impl ConfigLimits {
    pub const DEFAULT: Self = Self {
        max_action_delay_ms: 10_000,
        max_action_repeat: 50,
        max_macro_payload_length: 2_048,
        max_http_retries: 5,
        max_macro_delay_ms: 10_000,
    };
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Accumulated validation errors. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<String>,
}

impl ValidationResult {
    #[must_use]
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn extend(&mut self, other: Self) {
        self.errors.extend(other.errors);
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }
}

/// One step of a keystroke macro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "value", rename_all = "snake_case")]
pub enum MacroStep {
    /// Press and hold every key in a `+`/`,` separated list.
    Press(String),
    /// Release every key in a `+`/`,` separated list.
    Release(String),
    /// Type a literal string.
    Text(String),
    /// Pause for the given number of milliseconds.
    Delay(u32),
}

/// Structured HTTP request carried by an `http_request` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpRequestDefinition {
    pub method: String,
    pub url: String,
    /// Later duplicates overwrite earlier ones.
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub timeout_ms: u32,
    pub retries: u32,
}

impl HttpRequestDefinition {
    pub const DEFAULT_TIMEOUT_MS: u32 = 5_000;
}

impl Default for HttpRequestDefinition {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            url: String::new(),
            headers: BTreeMap::new(),
            body: String::new(),
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
            retries: 0,
        }
    }
}

/// A single configured action; composites nest children in `actions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub payload: String,
    pub delay_ms: u32,
    pub repeat: u32,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<MacroStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_request: Option<HttpRequestDefinition>,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            action_type: String::new(),
            payload: String::new(),
            delay_ms: 0,
            repeat: 1,
            enabled: true,
            actions: Vec::new(),
            steps: Vec::new(),
            http_request: None,
        }
    }
}

impl ActionConfig {
    /// Create an enabled action that runs once.
    #[must_use]
    pub fn new(id: impl Into<String>, action_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action_type: action_type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    #[must_use]
    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat;
        self
    }

    #[must_use]
    pub fn with_delay_ms(mut self, delay_ms: u32) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<Self>) -> Self {
        self.actions = children;
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Id for log lines; `<unnamed>` when empty.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.id.is_empty() { "<unnamed>" } else { &self.id }
    }

    #[must_use]
    pub fn is_supported_type(action_type: &str) -> bool {
        ACTION_TYPES.contains(&action_type)
    }

    /// Id and type rules only. The dispatcher re-checks these at run time.
    #[must_use]
    pub fn validate_structure(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        if self.id.is_empty() {
            result.push("action.id is required");
        }
        if self.action_type.is_empty() {
            result.push("action.type is required");
        } else if !Self::is_supported_type(&self.action_type) {
            result.push(format!(
                "action.type must be one of the supported values (value={})",
                self.action_type
            ));
        }
        result
    }

    /// Structural rules plus every limit in `limits`. Children are not visited.
    #[must_use]
    pub fn validate_with(&self, limits: &ConfigLimits) -> ValidationResult {
        let mut result = self.validate_structure();
        let id = &self.id;
        if self.delay_ms > limits.max_action_delay_ms {
            result.push(format!(
                "action.delay_ms exceeds max (id={id}, value={}, max={})",
                self.delay_ms, limits.max_action_delay_ms
            ));
        }
        if self.repeat > limits.max_action_repeat {
            result.push(format!(
                "action.repeat exceeds max (id={id}, value={}, max={})",
                self.repeat, limits.max_action_repeat
            ));
        }
        if self.action_type == "macro" && self.payload.len() > limits.max_macro_payload_length {
            result.push(format!(
                "action.payload macro length exceeds max (id={id}, length={}, max={})",
                self.payload.len(),
                limits.max_macro_payload_length
            ));
        }
        for step in &self.steps {
            if let MacroStep::Delay(ms) = step {
                if *ms > limits.max_macro_delay_ms {
                    result.push(format!(
                        "action.steps.delay_ms exceeds max (id={id}, value={ms}, max={})",
                        limits.max_macro_delay_ms
                    ));
                }
            }
        }
        if let Some(request) = &self.http_request {
            if request.retries > limits.max_http_retries {
                result.push(format!(
                    "action.retries exceeds max (id={id}, value={}, max={})",
                    request.retries, limits.max_http_retries
                ));
            }
        }
        result
    }

    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        self.validate_with(&ConfigLimits::default())
    }
}

/// One physical or logical key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Reference into the enclosing scope's action list; empty means none.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub action_id: String,
    /// Inline actions, independent of `action_id`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionConfig>,
    pub key_index: u8,
    pub enabled: bool,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            label: String::new(),
            icon: None,
            action_id: String::new(),
            actions: Vec::new(),
            key_index: 0,
            enabled: true,
        }
    }
}

impl KeyConfig {
    #[must_use]
    pub fn new(id: impl Into<String>, key_index: u8) -> Self {
        Self {
            id: id.into(),
            key_index,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        if self.id.is_empty() {
            result.push("key.id is required");
        }
        result
    }
}

/// Validate a list of sibling actions and, recursively, their children.
///
/// Returns the ids declared by this list so callers can resolve references.
fn validate_action_list<'a>(
    actions: &'a [ActionConfig],
    limits: &ConfigLimits,
    result: &mut ValidationResult,
) -> HashSet<&'a str> {
    let mut ids = HashSet::new();
    for action in actions {
        result.extend(action.validate_with(limits));
        if !action.id.is_empty() && !ids.insert(action.id.as_str()) {
            result.push(format!(
                "action.id values must be unique (duplicate={})",
                action.id
            ));
        }
        if !action.actions.is_empty() {
            validate_action_list(&action.actions, limits, result);
        }
    }
    ids
}

/// Keys and actions that ids resolve within: a profile, or the flat fallback.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub keys: &'a [KeyConfig],
    pub actions: &'a [ActionConfig],
}

impl<'a> Scope<'a> {
    #[must_use]
    pub fn find_action(&self, id: &str) -> Option<&'a ActionConfig> {
        self.actions.iter().find(|action| action.id == id)
    }

    #[must_use]
    pub fn find_key(&self, id: &str) -> Option<&'a KeyConfig> {
        self.keys.iter().find(|key| key.id == id)
    }

    /// First key whose `key_index` equals the chord event id.
    #[must_use]
    pub fn key_for_event(&self, event_id: u8) -> Option<&'a KeyConfig> {
        self.keys.iter().find(|key| key.key_index == event_id)
    }

    #[must_use]
    pub fn validate_with(&self, limits: &ConfigLimits) -> ValidationResult {
        let mut result = ValidationResult::default();
        let action_ids = validate_action_list(self.actions, limits, &mut result);

        let mut key_ids = HashSet::new();
        for key in self.keys {
            result.extend(key.validate());
            if !key.id.is_empty() && !key_ids.insert(key.id.as_str()) {
                result.push(format!("key.id values must be unique (duplicate={})", key.id));
            }
            if !key.action_id.is_empty() && !action_ids.contains(key.action_id.as_str()) {
                result.push(format!(
                    "key.action_id must reference a known action.id (key={}, action_id={})",
                    key.id, key.action_id
                ));
            }
            validate_action_list(&key.actions, limits, &mut result);
        }
        result
    }
}

/// A named bundle of keys and actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub label: String,
    pub keys: Vec<KeyConfig>,
    pub actions: Vec<ActionConfig>,
}

impl ProfileConfig {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn scope(&self) -> Scope<'_> {
        Scope {
            keys: &self.keys,
            actions: &self.actions,
        }
    }

    #[must_use]
    pub fn validate_with(&self, limits: &ConfigLimits) -> ValidationResult {
        self.scope().validate_with(limits)
    }

    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        self.validate_with(&ConfigLimits::default())
    }
}

/// Root of a parsed configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigRoot {
    pub version: u32,
    pub debounce_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_profile: Option<String>,
    /// Used only when `profiles` is empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<KeyConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<ProfileConfig>,
}

impl Default for ConfigRoot {
    fn default() -> Self {
        Self {
            version: SUPPORTED_VERSION,
            debounce_ms: 30,
            active_profile: None,
            keys: Vec::new(),
            actions: Vec::new(),
            profiles: Vec::new(),
        }
    }
}

impl ConfigRoot {
    #[must_use]
    pub fn validate_with(&self, limits: &ConfigLimits) -> ValidationResult {
        let mut result = ValidationResult::default();
        if self.version != SUPPORTED_VERSION {
            result.push(format!(
                "config.version must be {SUPPORTED_VERSION} (value={})",
                self.version
            ));
        }

        if self.profiles.is_empty() {
            result.extend(self.fallback_scope().validate_with(limits));
            if self.active_profile.is_some() {
                result.push("config.active_profile requires profiles");
            }
            return result;
        }

        let mut profile_ids = HashSet::new();
        for profile in &self.profiles {
            if profile.id.is_empty() {
                result.push("profile.id is required");
            } else if !profile_ids.insert(profile.id.as_str()) {
                result.push(format!(
                    "profile.id values must be unique (duplicate={})",
                    profile.id
                ));
            }
            result.extend(profile.validate_with(limits));
        }

        if let Some(active) = &self.active_profile {
            if self.find_profile(active).is_none() {
                result.push(format!(
                    "config.active_profile must reference an existing profile.id (value={active})"
                ));
            }
        }
        result
    }

    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        self.validate_with(&ConfigLimits::default())
    }

    #[must_use]
    pub fn find_profile(&self, profile_id: &str) -> Option<&ProfileConfig> {
        self.profiles.iter().find(|profile| profile.id == profile_id)
    }

    /// The named profile if it exists, else the first declared one.
    /// `None` only when there are no profiles.
    #[must_use]
    pub fn active_profile(&self) -> Option<&ProfileConfig> {
        if let Some(active) = &self.active_profile {
            if let Some(profile) = self.find_profile(active) {
                return Some(profile);
            }
        }
        self.profiles.first()
    }

    /// The flat `keys`/`actions` lists, regardless of profiles.
    #[must_use]
    pub fn fallback_scope(&self) -> Scope<'_> {
        Scope {
            keys: &self.keys,
            actions: &self.actions,
        }
    }

    /// Scope of the active profile, or the flat lists when there are no profiles.
    #[must_use]
    pub fn active_scope(&self) -> Scope<'_> {
        self.active_profile()
            .map_or_else(|| self.fallback_scope(), ProfileConfig::scope)
    }
}
