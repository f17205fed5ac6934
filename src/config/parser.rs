//! Streaming parser for the keypad configuration format.
//!
//! The format is a small indentation-scoped subset of YAML: four top-level
//! blocks (`config:`, `keys:`, `actions:`, `profiles:`), list items introduced
//! by `- `, and `field: value` assignments. Nested blocks (`keys:`/`actions:`
//! inside a profile, `actions:` inside a key, `steps:`/`headers:`/`actions:`
//! inside an action) push a frame remembering the section to return to and the
//! indentation of their header. Any later line at or below that indentation
//! closes the block.
//!
//! Entries are materialized into their owners only when a sibling list item
//! starts, the enclosing block closes, or [`ConfigParser::finish`] is called.

use thiserror::Error;
use tracing::{debug, trace};

use super::schema::{ActionConfig, ConfigRoot, KeyConfig, MacroStep, ProfileConfig};
use crate::error::KeypadError;

/// First structural problem found in a document. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl From<ParseError> for KeypadError {
    fn from(err: ParseError) -> Self {
        Self::ConfigParse {
            line: err.line,
            message: err.message,
        }
    }
}

/// What the current line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    #[default]
    None,
    Config,
    Keys,
    Actions,
    Profiles,
    ProfileKeys,
    ProfileActions,
    KeyActions,
    ActionSteps,
    ActionHeaders,
    ActionChildren,
}

impl Section {
    const fn holds_keys(self) -> bool {
        matches!(self, Self::Keys | Self::ProfileKeys)
    }

    const fn holds_actions(self) -> bool {
        matches!(
            self,
            Self::Actions | Self::ProfileActions | Self::KeyActions | Self::ActionChildren
        )
    }
}

/// Where a finalized entry is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Root,
    Profile,
    Key,
    /// The open action one level further out.
    Parent,
}

#[derive(Debug)]
struct Frame {
    parent: Section,
    indent: usize,
}

/// One open action list and its in-progress entry.
#[derive(Debug)]
struct ActionLevel {
    owner: Owner,
    current: Option<ActionConfig>,
}

type LineResult = std::result::Result<(), String>;

/// Line-at-a-time configuration parser. Use a fresh parser per document.
#[derive(Debug, Default)]
pub struct ConfigParser {
    root: ConfigRoot,
    section: Section,
    frames: Vec<Frame>,
    levels: Vec<ActionLevel>,
    profile: Option<ProfileConfig>,
    key: Option<(Owner, KeyConfig)>,
    line: usize,
}

impl ConfigParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lines fed so far, including blanks and comments.
    #[must_use]
    pub const fn lines_consumed(&self) -> usize {
        self.line
    }

    /// Consume one line of input. A trailing `\n` or `\r\n` is ignored.
    pub fn feed_line(&mut self, raw: &str) -> Result<(), ParseError> {
        self.line += 1;
        let trimmed = raw.trim_matches([' ', '\t', '\r', '\n']);
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(());
        }
        let indent = raw.chars().take_while(|c| matches!(c, ' ' | '\t')).count();

        self.interpret(trimmed, indent).map_err(|message| {
            debug!(line = self.line, %message, "Config parse failed");
            ParseError {
                line: self.line,
                message,
            }
        })
    }

    /// Close every open block and return the document.
    #[must_use]
    pub fn finish(mut self) -> ConfigRoot {
        self.finalize_all();
        debug!(
            lines = self.line,
            profiles = self.root.profiles.len(),
            keys = self.root.keys.len(),
            actions = self.root.actions.len(),
            "Config parsed"
        );
        self.root
    }

    fn interpret(&mut self, line: &str, indent: usize) -> LineResult {
        while self.frames.last().is_some_and(|frame| indent <= frame.indent) {
            self.close_frame();
        }

        if indent == 0 {
            if let Some(section) = top_level_section(line) {
                self.finalize_all();
                if section == Section::Actions {
                    self.levels.push(ActionLevel {
                        owner: Owner::Root,
                        current: None,
                    });
                }
                trace!(line = self.line, ?section, "Entering top-level section");
                self.section = section;
                return Ok(());
            }
        }

        if self.open_block(line, indent)? {
            return Ok(());
        }

        match self.section {
            Section::ActionSteps => return self.push_step(line),
            Section::ActionHeaders => return self.push_header(line),
            _ => {}
        }

        if let Some(rest) = line.strip_prefix('-') {
            self.begin_entry()?;
            let rest = rest.trim();
            if rest.is_empty() {
                return Ok(());
            }
            let (field, value) =
                split_field(rest).ok_or_else(|| format!("Malformed list entry: {rest}"))?;
            return self.assign(field, value);
        }

        let (field, value) = split_field(line).ok_or_else(|| format!("Malformed line: {line}"))?;
        self.assign(field, value)
    }

    /// Handle a nested block header. Returns false when `line` is not one.
    fn open_block(&mut self, line: &str, indent: usize) -> Result<bool, String> {
        let Some(name) = line.strip_suffix(':').map(str::trim_end) else {
            return Ok(false);
        };
        let has_action = self.current_action().is_some();

        let next = match (self.section, name) {
            (Section::Profiles, "keys") => {
                if self.profile.is_none() {
                    return Err("profiles.keys requires an active profile".to_string());
                }
                Section::ProfileKeys
            }
            (Section::Profiles, "actions") => {
                if self.profile.is_none() {
                    return Err("profiles.actions requires an active profile".to_string());
                }
                Section::ProfileActions
            }
            (section, "actions") if section.holds_keys() => {
                if self.key.is_none() {
                    return Err("key.actions requires an active key".to_string());
                }
                Section::KeyActions
            }
            (section, block @ ("actions" | "steps" | "headers")) if section.holds_actions() => {
                if !has_action {
                    return Err(format!("action.{block} requires an active action"));
                }
                match block {
                    "steps" => Section::ActionSteps,
                    "headers" => Section::ActionHeaders,
                    _ => Section::ActionChildren,
                }
            }
            _ => return Ok(false),
        };

        self.frames.push(Frame {
            parent: self.section,
            indent,
        });
        let owner = match next {
            Section::ProfileActions => Some(Owner::Profile),
            Section::KeyActions => Some(Owner::Key),
            Section::ActionChildren => Some(Owner::Parent),
            _ => None,
        };
        if let Some(owner) = owner {
            self.levels.push(ActionLevel {
                owner,
                current: None,
            });
        }
        trace!(line = self.line, section = ?next, indent, "Opened block");
        self.section = next;
        Ok(true)
    }

    fn begin_entry(&mut self) -> LineResult {
        match self.section {
            Section::Profiles => {
                self.finalize_profile();
                self.profile = Some(ProfileConfig::default());
            }
            Section::Keys | Section::ProfileKeys => {
                self.finalize_key();
                self.key = Some((self.key_owner(), KeyConfig::default()));
            }
            section if section.holds_actions() => {
                self.finalize_action();
                if let Some(level) = self.levels.last_mut() {
                    level.current = Some(ActionConfig::default());
                }
            }
            _ => return Err("List item found outside keys/actions/profiles section".to_string()),
        }
        Ok(())
    }

    fn assign(&mut self, field: &str, value: &str) -> LineResult {
        match self.section {
            Section::None | Section::Config => assign_config_field(&mut self.root, field, value),
            Section::Profiles => {
                let profile = self.profile.get_or_insert_with(ProfileConfig::default);
                match field {
                    "id" => profile.id = value.to_string(),
                    "label" => profile.label = value.to_string(),
                    _ => return Err(format!("Unknown profile field: {field}")),
                }
                Ok(())
            }
            Section::Keys | Section::ProfileKeys => {
                let owner = self.key_owner();
                let (_, key) = self.key.get_or_insert_with(|| (owner, KeyConfig::default()));
                assign_key_field(key, field, value)
            }
            section if section.holds_actions() => {
                let level = self
                    .levels
                    .last_mut()
                    .ok_or_else(|| "Unexpected YAML section".to_string())?;
                let action = level.current.get_or_insert_with(ActionConfig::default);
                assign_action_field(action, field, value)
            }
            _ => Err("Unexpected YAML section".to_string()),
        }
    }

    fn push_step(&mut self, line: &str) -> LineResult {
        let rest = line
            .strip_prefix('-')
            .ok_or_else(|| "action.steps entries must be list items".to_string())?
            .trim();
        if rest.is_empty() {
            return Err("action.steps entries must include a field".to_string());
        }
        let (field, value) =
            split_field(rest).ok_or_else(|| format!("Malformed action step: {rest}"))?;
        let step = match field {
            "press" => MacroStep::Press(value.to_string()),
            "release" => MacroStep::Release(value.to_string()),
            "text" => MacroStep::Text(value.to_string()),
            "delay_ms" | "delay" => MacroStep::Delay(
                parse_u32(value)
                    .ok_or_else(|| "action.steps.delay_ms must be an integer".to_string())?,
            ),
            other => return Err(format!("Unknown action step: {other}")),
        };
        let action = self
            .current_action_mut()
            .ok_or_else(|| "action.steps requires an active action".to_string())?;
        action.steps.push(step);
        Ok(())
    }

    fn push_header(&mut self, line: &str) -> LineResult {
        let rest = line
            .strip_prefix('-')
            .ok_or_else(|| "action.headers entries must be list items".to_string())?
            .trim();
        if rest.is_empty() {
            return Err("action.headers entries must include a field".to_string());
        }
        let (name, value) =
            split_field(rest).ok_or_else(|| format!("Malformed header entry: {rest}"))?;
        let action = self
            .current_action_mut()
            .ok_or_else(|| "action.headers requires an active action".to_string())?;
        action
            .http_request
            .get_or_insert_with(Default::default)
            .headers
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn key_owner(&self) -> Owner {
        if self.section == Section::ProfileKeys {
            Owner::Profile
        } else {
            Owner::Root
        }
    }

    fn current_action(&self) -> Option<&ActionConfig> {
        self.levels.last().and_then(|level| level.current.as_ref())
    }

    fn current_action_mut(&mut self) -> Option<&mut ActionConfig> {
        self.levels.last_mut().and_then(|level| level.current.as_mut())
    }

    fn close_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        match self.section {
            Section::ProfileKeys => self.finalize_key(),
            Section::ProfileActions | Section::KeyActions | Section::ActionChildren => {
                self.close_level();
            }
            _ => {}
        }
        trace!(line = self.line, closed = ?self.section, parent = ?frame.parent, "Closed block");
        self.section = frame.parent;
    }

    fn close_level(&mut self) {
        self.finalize_action();
        self.levels.pop();
    }

    fn finalize_action(&mut self) {
        let Some(level) = self.levels.last_mut() else {
            return;
        };
        let owner = level.owner;
        let Some(action) = level.current.take() else {
            return;
        };
        match owner {
            Owner::Root => self.root.actions.push(action),
            Owner::Profile => {
                if let Some(profile) = self.profile.as_mut() {
                    profile.actions.push(action);
                }
            }
            Owner::Key => {
                if let Some((_, key)) = self.key.as_mut() {
                    key.actions.push(action);
                }
            }
            Owner::Parent => {
                let depth = self.levels.len();
                if let Some(parent) = depth
                    .checked_sub(2)
                    .and_then(|index| self.levels[index].current.as_mut())
                {
                    parent.actions.push(action);
                }
            }
        }
    }

    fn finalize_key(&mut self) {
        let Some((owner, key)) = self.key.take() else {
            return;
        };
        match (owner, self.profile.as_mut()) {
            (Owner::Profile, Some(profile)) => profile.keys.push(key),
            _ => self.root.keys.push(key),
        }
    }

    fn finalize_profile(&mut self) {
        if let Some(profile) = self.profile.take() {
            self.root.profiles.push(profile);
        }
    }

    fn finalize_all(&mut self) {
        while !self.frames.is_empty() {
            self.close_frame();
        }
        self.finalize_key();
        while !self.levels.is_empty() {
            self.close_level();
        }
        self.finalize_profile();
        self.section = Section::None;
    }
}

fn top_level_section(line: &str) -> Option<Section> {
    match line {
        "config:" => Some(Section::Config),
        "keys:" => Some(Section::Keys),
        "actions:" => Some(Section::Actions),
        "profiles:" => Some(Section::Profiles),
        _ => None,
    }
}

fn assign_config_field(root: &mut ConfigRoot, field: &str, value: &str) -> LineResult {
    match field {
        "version" => {
            root.version =
                parse_u32(value).ok_or_else(|| "config.version must be an integer".to_string())?;
        }
        "debounce_ms" => {
            root.debounce_ms = parse_u32(value)
                .ok_or_else(|| "config.debounce_ms must be an integer".to_string())?;
        }
        "active_profile" => {
            root.active_profile = (!value.is_empty()).then(|| value.to_string());
        }
        _ => return Err(format!("Unknown config field: {field}")),
    }
    Ok(())
}

fn assign_key_field(key: &mut KeyConfig, field: &str, value: &str) -> LineResult {
    match field {
        "id" => key.id = value.to_string(),
        "label" => key.label = value.to_string(),
        "icon" => key.icon = Some(value.to_string()),
        "action_id" => key.action_id = value.to_string(),
        "key_index" => {
            key.key_index = value
                .parse::<u8>()
                .ok()
                .filter(|_| is_decimal(value))
                .ok_or_else(|| "key.key_index must be an integer".to_string())?;
        }
        "enabled" => {
            key.enabled =
                parse_bool(value).ok_or_else(|| "key.enabled must be true or false".to_string())?;
        }
        _ => return Err(format!("Unknown key field: {field}")),
    }
    Ok(())
}

fn assign_action_field(action: &mut ActionConfig, field: &str, value: &str) -> LineResult {
    match field {
        "id" => action.id = value.to_string(),
        "type" => action.action_type = value.to_string(),
        "payload" => action.payload = unescape_newlines(value),
        "delay_ms" => {
            action.delay_ms =
                parse_u32(value).ok_or_else(|| "action.delay_ms must be an integer".to_string())?;
        }
        "repeat" => {
            action.repeat =
                parse_u32(value).ok_or_else(|| "action.repeat must be an integer".to_string())?;
        }
        "enabled" => {
            action.enabled = parse_bool(value)
                .ok_or_else(|| "action.enabled must be true or false".to_string())?;
        }
        "method" | "url" | "body" | "timeout_ms" | "timeout" | "retries" | "retry" => {
            let request = action.http_request.get_or_insert_with(Default::default);
            match field {
                "method" => request.method = value.to_string(),
                "url" => request.url = value.to_string(),
                "body" => request.body = unescape_newlines(value),
                "timeout_ms" | "timeout" => {
                    request.timeout_ms = parse_u32(value)
                        .ok_or_else(|| "action.timeout_ms must be an integer".to_string())?;
                }
                _ => {
                    request.retries = parse_u32(value)
                        .ok_or_else(|| "action.retries must be an integer".to_string())?;
                }
            }
        }
        _ => return Err(format!("Unknown action field: {field}")),
    }
    Ok(())
}

/// Split `field: value` at the first colon; the value is unquoted.
fn split_field(text: &str) -> Option<(&str, &str)> {
    let (field, value) = text.split_once(':')?;
    Some((field.trim(), strip_quotes(value.trim())))
}

/// Remove one pair of matching `"` or `'` quotes.
pub(crate) fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

pub(crate) fn unescape_newlines(value: &str) -> String {
    value.replace("\\n", "\n")
}

fn is_decimal(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Strict unsigned decimal; signs, whitespace and overflow are rejected.
pub(crate) fn parse_u32(value: &str) -> Option<u32> {
    if is_decimal(value) { value.parse().ok() } else { None }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Parse a whole document held in memory.
pub fn parse_str(text: &str) -> Result<ConfigRoot, ParseError> {
    let mut parser = ConfigParser::new();
    for line in text.lines() {
        parser.feed_line(line)?;
    }
    Ok(parser.finish())
}
