//! Storage backends that can provide the configuration document.
//!
//! A source is asked for [`CONFIG_PATH`] and answers with a line reader, with
//! `None` when the file is absent, or with an I/O error when the medium itself
//! is unusable. Directory roots accept `~` for the home directory.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{KeypadError, Result};

/// Fixed location of the document inside every source.
pub const CONFIG_PATH: &str = "/config.yaml";

/// A place the loader can read the configuration from.
pub trait ConfigSource: Send + Sync {
    /// Short name used in diagnostics, e.g. `primary`.
    fn label(&self) -> &str;

    /// Open `path` for reading. `Ok(None)` means the file does not exist.
    fn open(&self, path: &str) -> io::Result<Option<Box<dyn BufRead + '_>>>;
}

/// Reads files below a directory on the local file system.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    label: String,
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(label: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            root: root.into(),
        }
    }

    /// Like [`DirectorySource::new`], expanding a leading `~`.
    pub fn with_expanded_root(label: impl Into<String>, root: &Path) -> Result<Self> {
        Ok(Self::new(label, expand_home(root)?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl ConfigSource for DirectorySource {
    fn label(&self) -> &str {
        &self.label
    }

    fn open(&self, path: &str) -> io::Result<Option<Box<dyn BufRead + '_>>> {
        if !self.root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", self.root.display()),
            ));
        }
        let full = self.resolve(path);
        trace!(source = %self.label, path = %full.display(), "Opening config");
        match File::open(&full) {
            Ok(file) => Ok(Some(Box::new(BufReader::new(file)))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(source = %self.label, path = %full.display(), "Config file absent");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// In-memory files, used for tests and for `--stdin` style input.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    label: String,
    files: HashMap<String, String>,
}

impl MemorySource {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            files: HashMap::new(),
        }
    }

    /// A source holding `text` at [`CONFIG_PATH`].
    pub fn with_config(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(label).with_file(CONFIG_PATH, text)
    }

    pub fn with_file(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.files.insert(path.into(), text.into());
        self
    }
}

impl ConfigSource for MemorySource {
    fn label(&self) -> &str {
        &self.label
    }

    fn open(&self, path: &str) -> io::Result<Option<Box<dyn BufRead + '_>>> {
        Ok(self
            .files
            .get(path)
            .map(|text| Box::new(Cursor::new(text.as_bytes())) as Box<dyn BufRead + '_>))
    }
}

/// Expand `~` and `~/...` to the user's home directory.
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let text = path.to_string_lossy();
    if text != "~" && !text.starts_with("~/") {
        return Ok(path.to_path_buf());
    }
    let home = home_dir()?;
    let expanded = match text.strip_prefix("~/") {
        Some(rest) if !rest.is_empty() => home.join(rest),
        _ => home,
    };
    debug!(original = %path.display(), resolved = %expanded.display(), "Expanded home directory path");
    Ok(expanded)
}

/// Resolve the user's home directory (cross-platform).
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| KeypadError::Other("Could not determine home directory".to_string()))
}

/// `$XDG_CONFIG_HOME/keypad` or the platform equivalent.
pub fn default_primary_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("keypad"))
}

/// `$XDG_DATA_HOME/keypad` or the platform equivalent.
pub fn default_fallback_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("keypad"))
}
