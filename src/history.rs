//! Recently used repository locators.
//!
//! A small JSON array of strings, most recent first, deduplicated and capped
//! at [`MAX_ENTRIES`]. Loading never fails: a missing or unreadable file is an
//! empty history.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Maximum number of remembered locators.
pub const MAX_ENTRIES: usize = 10;

/// File name inside the application config directory.
pub const HISTORY_FILE_NAME: &str = "history.json";

/// Errors raised while saving the history file.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The file or its parent directory could not be written.
    #[error("failed to write history file {}: {source}", path.display())]
    Io {
        /// The history file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The entries could not be serialized.
    #[error("failed to serialize history: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Ordered list of recently used locators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a history from entries in most-recent-first order, applying the
    /// cap and dropping blanks and duplicates.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = String>) -> Self {
        let mut history = Self::new();
        for entry in entries {
            let entry = entry.trim();
            if !entry.is_empty() && !history.entries.iter().any(|e| e == entry) {
                history.entries.push(entry.to_string());
            }
        }
        history.entries.truncate(MAX_ENTRIES);
        history
    }

    /// Entries, most recent first.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Moves `locator` to the front, inserting it if new and evicting the
    /// oldest entry beyond the cap. Blank locators are ignored.
    pub fn record(&mut self, locator: &str) {
        let locator = locator.trim();
        if locator.is_empty() {
            return;
        }
        self.entries.retain(|entry| entry != locator);
        self.entries.insert(0, locator.to_string());
        self.entries.truncate(MAX_ENTRIES);
    }

    /// Reads the history at `path`. Any problem yields an empty history.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no history file yet");
                return Self::new();
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "could not read history file");
                return Self::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(entries) => Self::from_entries(entries),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "ignoring malformed history file");
                Self::new()
            }
        }
    }

    /// Writes the history to `path`, creating the parent directory.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), HistoryError> {
        let io_error = |source| HistoryError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(&self.entries).map_err(HistoryError::Serialize)?;
        fs::write(path, json).map_err(io_error)?;
        debug!(path = %path.display(), entries = self.entries.len(), "history saved");
        Ok(())
    }
}

/// Default history location.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/repofetch/history.json`
/// 2. `$HOME/.config/repofetch/history.json`
#[must_use]
pub fn default_history_path() -> Option<PathBuf> {
    crate::config::app_config_dir().map(|dir| dir.join(HISTORY_FILE_NAME))
}
