//! File configuration for command-line defaults.
//!
//! The file is a flat TOML subset: one `key = value` per line, `#` comments,
//! double-quoted strings and bare integers. Command-line values win over the
//! file; the file wins over built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Directory name under the user config directory.
pub const APP_DIR_NAME: &str = "repofetch";

/// Config file name inside [`APP_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while reading or validating the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A line is not `key = value`.
    #[error("invalid config syntax on line {line}: expected key = value")]
    Syntax {
        /// 1-based line number.
        line: usize,
    },

    /// A key is not recognized.
    #[error("unknown configuration key '{key}' on line {line}")]
    UnknownKey {
        /// The unrecognized key.
        key: String,
        /// 1-based line number.
        line: usize,
    },

    /// A value has the wrong shape for its key.
    #[error("invalid `{key}` value on line {line}: {reason}")]
    InvalidValue {
        /// The key being set.
        key: &'static str,
        /// 1-based line number.
        line: usize,
        /// What was expected.
        reason: String,
    },

    /// A value parsed but lies outside its allowed range.
    #[error("invalid config value for `{key}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// The key being set.
        key: &'static str,
        /// The rejected value.
        value: u64,
        /// The allowed range.
        expected: &'static str,
    },
}

/// Supported verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    /// `info` level.
    Default,
    /// `debug` level.
    Verbose,
    /// `error` level.
    Quiet,
    /// `trace` level.
    Debug,
}

impl VerbositySetting {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }
}

/// Values read from the config file. `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default destination directory.
    pub output_dir: Option<PathBuf>,
    /// Default number of concurrent file fetches (1..=100).
    pub concurrency: Option<u8>,
    /// Default minimum delay between same-host requests, in milliseconds (0..=60000).
    pub rate_limit: Option<u64>,
    /// Default maximum retries for transient failures (0..=10).
    pub max_retries: Option<u8>,
    /// Base URL of the contents API.
    pub api_url: Option<String>,
    /// Connect timeout in seconds (1..=3600).
    pub connect_timeout_secs: Option<u64>,
    /// Whole-request timeout in seconds (1..=3600).
    pub read_timeout_secs: Option<u64>,
    /// Default verbosity.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates values against the same ranges the command line enforces.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("concurrency", self.concurrency.map(u64::from), 1, 100, "1..=100")?;
        check_range("rate_limit", self.rate_limit, 0, 60_000, "0..=60000")?;
        check_range("max_retries", self.max_retries.map(u64::from), 0, 10, "0..=10")?;
        check_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600, "1..=3600")?;
        check_range("read_timeout_secs", self.read_timeout_secs, 1, 3600, "1..=3600")?;
        Ok(())
    }
}

fn check_range(
    key: &'static str,
    value: Option<u64>,
    min: u64,
    max: u64,
    expected: &'static str,
) -> Result<(), ConfigError> {
    match value {
        Some(value) if !(min..=max).contains(&value) => Err(ConfigError::OutOfRange {
            key,
            value,
            expected,
        }),
        _ => Ok(()),
    }
}

/// Per-user application directory.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/repofetch`
/// 2. `$HOME/.config/repofetch`
#[must_use]
pub fn app_config_dir() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR_NAME));
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(PathBuf::from(home).join(".config").join(APP_DIR_NAME))
}

/// Default config file location, if a base directory is known.
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    app_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file at the default path.
///
/// Returns `Ok(None)` when no base directory is known or the file is absent.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
pub fn load_default_file_config() -> Result<Option<(PathBuf, FileConfig)>, ConfigError> {
    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        debug!(path = %path.display(), "no config file");
        return Ok(None);
    }
    let config = load_file_config(&path)?;
    Ok(Some((path, config)))
}

/// Loads and validates the config file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&raw)
}

/// Parses config text.
///
/// # Errors
///
/// Returns [`ConfigError`] naming the offending line or key.
pub fn parse_config_str(raw: &str) -> Result<FileConfig, ConfigError> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            return Err(ConfigError::Syntax { line: line_no });
        };
        let value = raw_value.trim();

        match raw_key.trim() {
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(string_value("output_dir", value, line_no)?));
            }
            "api_url" => cfg.api_url = Some(string_value("api_url", value, line_no)?),
            "concurrency" => cfg.concurrency = Some(u8_value("concurrency", value, line_no)?),
            "max_retries" => cfg.max_retries = Some(u8_value("max_retries", value, line_no)?),
            "rate_limit" => cfg.rate_limit = Some(u64_value("rate_limit", value, line_no)?),
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(u64_value("connect_timeout_secs", value, line_no)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(u64_value("read_timeout_secs", value, line_no)?);
            }
            "verbosity" => {
                let label = string_value("verbosity", value, line_no)?;
                cfg.verbosity = Some(parse_verbosity(&label).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        key: "verbosity",
                        line: line_no,
                        reason: format!(
                            "'{label}' is not one of: default, verbose, quiet, debug"
                        ),
                    }
                })?);
            }
            unknown => {
                return Err(ConfigError::UnknownKey {
                    key: unknown.to_string(),
                    line: line_no,
                });
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn invalid(key: &'static str, line: usize, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        line,
        reason: reason.into(),
    }
}

fn string_value(key: &'static str, raw: &str, line: usize) -> Result<String, ConfigError> {
    raw.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_string)
        .ok_or_else(|| invalid(key, line, "expected double-quoted string"))
}

fn u64_value(key: &'static str, raw: &str, line: usize) -> Result<u64, ConfigError> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(invalid(key, line, "expected integer value"));
    }
    if token.starts_with('-') {
        return Err(invalid(key, line, "expected non-negative integer"));
    }
    token
        .parse::<u64>()
        .map_err(|e| invalid(key, line, e.to_string()))
}

fn u8_value(key: &'static str, raw: &str, line: usize) -> Result<u8, ConfigError> {
    let value = u64_value(key, raw, line)?;
    u8::try_from(value).map_err(|_| ConfigError::OutOfRange {
        key,
        value,
        expected: "0..=255",
    })
}

fn parse_verbosity(value: &str) -> Option<VerbositySetting> {
    match value {
        "default" => Some(VerbositySetting::Default),
        "verbose" => Some(VerbositySetting::Verbose),
        "quiet" => Some(VerbositySetting::Quiet),
        "debug" => Some(VerbositySetting::Debug),
        _ => None,
    }
}
