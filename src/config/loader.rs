//! Loads, validates and publishes the active configuration.
//!
//! A reload reads [`CONFIG_PATH`] from the primary source, or from the
//! fallback when the primary has no such file or cannot be opened. The text is
//! parsed, then validated against [`ConfigLimits`]. Only when both succeed is
//! the new tree swapped in; otherwise the previous configuration stays active
//! and the reasons are kept in [`ConfigLoader::diagnostics`].

use std::io::{self, BufRead};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, instrument, warn};

use super::parser::{ConfigParser, ParseError};
use super::schema::{ConfigLimits, ConfigRoot};
use super::source::{CONFIG_PATH, ConfigSource};
use crate::error::{KeypadError, Result};

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub source: String,
    pub lines: usize,
    /// Hex SHA-256 of the consumed text, one `\n` per line.
    pub sha256: String,
    pub loaded_at: DateTime<Utc>,
}

enum ReadFailure {
    Io(io::Error),
    Parse(ParseError),
}

struct ParsedDocument {
    root: ConfigRoot,
    provenance: Provenance,
}

/// Owner of the active configuration snapshot.
pub struct ConfigLoader {
    primary: Box<dyn ConfigSource>,
    fallback: Option<Box<dyn ConfigSource>>,
    limits: ConfigLimits,
    config: Arc<ConfigRoot>,
    last_error: Option<String>,
    diagnostics: Vec<String>,
    provenance: Option<Provenance>,
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("primary", &self.primary.label())
            .field("fallback", &self.fallback.as_ref().map(|s| s.label()))
            .field("last_error", &self.last_error)
            .field("provenance", &self.provenance)
            .finish_non_exhaustive()
    }
}

impl ConfigLoader {
    /// A loader with an empty (valid) configuration active.
    pub fn new(primary: Box<dyn ConfigSource>, fallback: Option<Box<dyn ConfigSource>>) -> Self {
        Self {
            primary,
            fallback,
            limits: ConfigLimits::default(),
            config: Arc::new(ConfigRoot::default()),
            last_error: None,
            diagnostics: Vec::new(),
            provenance: None,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ConfigLimits) -> Self {
        self.limits = limits;
        self
    }

    pub const fn limits(&self) -> &ConfigLimits {
        &self.limits
    }

    /// Snapshot of the active configuration.
    pub fn config(&self) -> Arc<ConfigRoot> {
        Arc::clone(&self.config)
    }

    /// Summary of the last failed reload; `None` after a success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Ordered notes from the last reload (missing sources, validation errors).
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub const fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    /// Re-read, parse and validate the document, swapping it in on success.
    #[instrument(skip(self), fields(primary = %self.primary.label()))]
    pub fn reload_config(&mut self) -> Result<()> {
        let mut diagnostics = Vec::new();

        let document = match self.read_document(&mut diagnostics) {
            Ok(Some(document)) => document,
            Ok(None) => {
                let message = format!(
                    "Failed to load {CONFIG_PATH} from {}",
                    self.source_labels().join(" or ")
                );
                diagnostics.push(message.clone());
                self.fail(message, diagnostics);
                return Err(KeypadError::ConfigNotFound {
                    path: CONFIG_PATH.to_string(),
                });
            }
            Err(ReadFailure::Parse(err)) => {
                diagnostics.push(err.to_string());
                self.fail(format!("Failed to parse {CONFIG_PATH}"), diagnostics);
                return Err(err.into());
            }
            Err(ReadFailure::Io(e)) => {
                self.fail(format!("Failed to read {CONFIG_PATH}"), diagnostics);
                return Err(e.into());
            }
        };

        let validation = document.root.validate_with(&self.limits);
        if !validation.ok() {
            let errors = validation.into_errors();
            diagnostics.extend(errors.iter().cloned());
            self.fail("Config validation failed".to_string(), diagnostics);
            return Err(KeypadError::ConfigInvalid { errors });
        }

        info!(
            source = %document.provenance.source,
            lines = document.provenance.lines,
            sha256 = %document.provenance.sha256,
            profiles = document.root.profiles.len(),
            "Configuration loaded"
        );
        self.config = Arc::new(document.root);
        self.provenance = Some(document.provenance);
        self.last_error = None;
        self.diagnostics = diagnostics;
        Ok(())
    }

    /// Select the profile used for key lookups.
    ///
    /// Fails without side effects when there are no profiles or the id is
    /// unknown.
    pub fn set_active_profile(&mut self, profile_id: &str) -> Result<()> {
        if self.config.profiles.is_empty() {
            return Err(KeypadError::NoProfiles);
        }
        if self.config.find_profile(profile_id).is_none() {
            return Err(KeypadError::ProfileNotFound {
                id: profile_id.to_string(),
            });
        }
        Arc::make_mut(&mut self.config).active_profile = Some(profile_id.to_string());
        info!(profile = profile_id, "Active profile changed");
        Ok(())
    }

    fn source_labels(&self) -> Vec<&str> {
        std::iter::once(self.primary.label())
            .chain(self.fallback.as_ref().map(|source| source.label()))
            .collect()
    }

    /// First source that yields the file wins. A read or parse failure there
    /// is final.
    fn read_document(
        &self,
        diagnostics: &mut Vec<String>,
    ) -> std::result::Result<Option<ParsedDocument>, ReadFailure> {
        let sources = std::iter::once(self.primary.as_ref()).chain(self.fallback.as_deref());
        for source in sources {
            let label = source.label();
            let reader = match source.open(CONFIG_PATH) {
                Ok(Some(reader)) => reader,
                Ok(None) => {
                    diagnostics.push(format!("{CONFIG_PATH} not found on {label}"));
                    continue;
                }
                Err(e) => {
                    warn!(source = label, error = %e, "Config source unavailable");
                    diagnostics.push(format!(
                        "{label} unavailable while looking for {CONFIG_PATH}: {e}"
                    ));
                    continue;
                }
            };

            return match parse_stream(reader, label) {
                Ok(document) => Ok(Some(document)),
                Err(ReadFailure::Io(e)) => {
                    warn!(source = label, error = %e, "Failed reading config");
                    diagnostics.push(format!("Failed reading {CONFIG_PATH} from {label}: {e}"));
                    Err(ReadFailure::Io(e))
                }
                Err(failure) => Err(failure),
            };
        }
        Ok(None)
    }

    fn fail(&mut self, message: String, diagnostics: Vec<String>) {
        for line in &diagnostics {
            error!(diagnostic = %line, "Config load failed");
        }
        debug!(kept_version = self.config.version, "Keeping previous configuration");
        self.last_error = Some(message);
        self.diagnostics = diagnostics;
    }
}

fn parse_stream(
    reader: Box<dyn BufRead + '_>,
    label: &str,
) -> std::result::Result<ParsedDocument, ReadFailure> {
    let mut parser = ConfigParser::new();
    let mut hasher = Sha256::new();
    for line in reader.lines() {
        let line = line.map_err(ReadFailure::Io)?;
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
        parser.feed_line(&line).map_err(ReadFailure::Parse)?;
    }
    let lines = parser.lines_consumed();
    Ok(ParsedDocument {
        root: parser.finish(),
        provenance: Provenance {
            source: label.to_string(),
            lines,
            sha256: hex::encode(hasher.finalize()),
            loaded_at: Utc::now(),
        },
    })
}
