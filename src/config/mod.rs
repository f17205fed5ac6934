//! Keypad configuration: data model, parser, storage sources and loader.
//!
//! The on-disk format is a constrained indentation-scoped mapping/list
//! document (see [`parser`]). [`ConfigLoader`] owns the active, validated
//! [`ConfigRoot`] and swaps it atomically on a successful reload.

pub mod loader;
pub mod parser;
pub mod schema;
pub mod source;

pub use loader::{ConfigLoader, Provenance};
pub use parser::{ConfigParser, ParseError, Section, parse_str};
pub use schema::{
    ACTION_TYPES, ActionConfig, ConfigLimits, ConfigRoot, HttpRequestDefinition, KeyConfig,
    MacroStep, ProfileConfig, SUPPORTED_VERSION, Scope, ValidationResult,
};
pub use source::{
    CONFIG_PATH, ConfigSource, DirectorySource, MemorySource, default_fallback_dir,
    default_primary_dir, expand_home,
};
