//! Repository locator parsing.
//!
//! Turns a user-supplied locator (a repository URL or an `owner/name` slug)
//! into the [`RepoCoordinate`] every remote call is addressed with. Parsing is
//! case-sensitive and purely syntactic: nothing is checked against the remote.

use std::fmt;

use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

/// Suffix stripped from the end of a locator before splitting it into segments.
const VCS_SUFFIX: &str = ".git";

/// Errors produced while parsing a locator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    /// The locator does not name an owner and a repository.
    #[error("invalid repository locator '{input}': {reason}")]
    InvalidLocator {
        /// The raw input, trimmed.
        input: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}

impl LocatorError {
    fn invalid(input: &str, reason: &'static str) -> Self {
        Self::InvalidLocator {
            input: input.to_string(),
            reason,
        }
    }
}

/// Parsed `(owner, name, ref)` triple addressing one repository snapshot.
///
/// Owner and name are guaranteed non-empty and free of `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoCoordinate {
    owner: String,
    name: String,
    git_ref: Option<String>,
}

impl RepoCoordinate {
    /// Builds a coordinate from already-separated parts.
    ///
    /// # Errors
    ///
    /// Returns [`LocatorError::InvalidLocator`] if `owner` or `name` is empty
    /// or contains a slash.
    pub fn new(owner: &str, name: &str) -> Result<Self, LocatorError> {
        let joined = format!("{owner}/{name}");
        if owner.is_empty() || name.is_empty() {
            return Err(LocatorError::invalid(&joined, "owner and name must be non-empty"));
        }
        if owner.contains('/') || name.contains('/') {
            return Err(LocatorError::invalid(&joined, "owner and name must not contain '/'"));
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            git_ref: None,
        })
    }

    /// Returns a copy pinned to `git_ref` (branch, tag or commit). An empty
    /// ref clears the pin.
    #[must_use]
    pub fn with_ref(mut self, git_ref: impl Into<String>) -> Self {
        let git_ref = git_ref.into();
        self.git_ref = (!git_ref.is_empty()).then_some(git_ref);
        self
    }

    /// Repository owner (user or organization).
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pinned ref, if any. `None` means the remote default branch.
    #[must_use]
    pub fn git_ref(&self) -> Option<&str> {
        self.git_ref.as_deref()
    }
}

impl fmt::Display for RepoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.git_ref {
            Some(git_ref) => write!(f, "{}/{}@{git_ref}", self.owner, self.name),
            None => write!(f, "{}/{}", self.owner, self.name),
        }
    }
}

/// Parses a repository URL or slug into a [`RepoCoordinate`].
///
/// Accepted shapes:
/// - `https://github.com/owner/name` (any host; the host is not checked)
/// - `https://github.com/owner/name.git`
/// - `https://github.com/owner/name/tree/<ref>/...` (ref is captured)
/// - `github.com/owner/name` (scheme-less URL)
/// - `owner/name`
///
/// # Errors
///
/// Returns [`LocatorError::InvalidLocator`] when fewer than two non-empty path
/// segments remain after removing a trailing `.git`.
///
/// # Examples
///
/// ```
/// use repofetch_core::parse_locator;
///
/// let coord = parse_locator("https://example.com/ownerA/repoB").unwrap();
/// assert_eq!(coord.owner(), "ownerA");
/// assert_eq!(coord.name(), "repoB");
/// assert!(parse_locator("owner/").is_err());
/// ```
#[instrument(level = "debug")]
pub fn parse_locator(input: &str) -> Result<RepoCoordinate, LocatorError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(LocatorError::invalid(trimmed, "locator is empty"));
    }

    let path = locator_path(trimmed);
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(VCS_SUFFIX).unwrap_or(path);

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let [owner, name, rest @ ..] = segments.as_slice() else {
        return Err(LocatorError::invalid(
            trimmed,
            "expected at least an owner and a repository name",
        ));
    };

    let mut coord = RepoCoordinate::new(owner, name)?;
    if let ["tree", git_ref, ..] = rest {
        coord = coord.with_ref(*git_ref);
    }

    debug!(coordinate = %coord, "parsed locator");
    Ok(coord)
}

/// Extracts the path part of a locator, dropping scheme, host, query and fragment.
fn locator_path(locator: &str) -> String {
    if let Ok(url) = Url::parse(locator)
        && url.has_host()
    {
        return url.path().to_string();
    }

    // Scheme-less: `github.com/owner/name` or a bare slug. Owners never
    // contain a dot, so a dotted first segment is a host.
    let without_query = locator
        .split(['?', '#'])
        .next()
        .unwrap_or(locator);
    match without_query.split_once('/') {
        Some((first, rest)) if first.contains('.') => rest.to_string(),
        _ => without_query.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_https_url() {
        let coord = parse_locator("https://example.com/ownerA/repoB").unwrap();
        assert_eq!(coord.owner(), "ownerA");
        assert_eq!(coord.name(), "repoB");
        assert_eq!(coord.git_ref(), None);
    }

    #[test]
    fn test_parse_strips_git_suffix_and_trailing_slash() {
        let coord = parse_locator("https://github.com/rust-lang/cargo.git").unwrap();
        assert_eq!(coord.name(), "cargo");

        let coord = parse_locator("https://github.com/rust-lang/cargo/").unwrap();
        assert_eq!(coord.name(), "cargo");
    }

    #[test]
    fn test_parse_git_suffix_only_removed_at_end() {
        // Names made of the suffix's letters must survive intact.
        let coord = parse_locator("https://github.com/owner/tig").unwrap();
        assert_eq!(coord.name(), "tig");
    }

    #[test]
    fn test_parse_slug() {
        let coord = parse_locator("ownerA/repoB").unwrap();
        assert_eq!(coord.owner(), "ownerA");
        assert_eq!(coord.name(), "repoB");
    }

    #[test]
    fn test_parse_schemeless_url() {
        let coord = parse_locator("github.com/tokio-rs/tokio").unwrap();
        assert_eq!(coord.owner(), "tokio-rs");
        assert_eq!(coord.name(), "tokio");
    }

    #[test]
    fn test_parse_captures_tree_ref() {
        let coord = parse_locator("https://github.com/o/r/tree/v1.2/src/lib").unwrap();
        assert_eq!(coord.git_ref(), Some("v1.2"));
        assert_eq!(coord.to_string(), "o/r@v1.2");
    }

    #[test]
    fn test_parse_ignores_extra_segments_and_query() {
        let coord = parse_locator("https://github.com/o/r/issues?q=1#top").unwrap();
        assert_eq!(coord.owner(), "o");
        assert_eq!(coord.name(), "r");
        assert_eq!(coord.git_ref(), None);
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        let coord = parse_locator("Owner/Repo").unwrap();
        assert_eq!(coord.owner(), "Owner");
        assert_eq!(coord.name(), "Repo");
    }

    #[test]
    fn test_parse_rejects_single_segment() {
        let err = parse_locator("owner/").unwrap_err();
        assert!(matches!(err, LocatorError::InvalidLocator { .. }));
        assert!(parse_locator("https://github.com/owner").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_and_suffix_only() {
        assert!(parse_locator("   ").is_err());
        assert!(parse_locator("owner/.git").is_err());
        assert!(parse_locator("https://github.com/").is_err());
    }

    #[test]
    fn test_coordinate_new_rejects_slashes() {
        assert!(RepoCoordinate::new("a/b", "c").is_err());
        assert!(RepoCoordinate::new("a", "").is_err());
    }

    #[test]
    fn test_with_empty_ref_clears_pin() {
        let coord = RepoCoordinate::new("a", "b").unwrap().with_ref("main").with_ref("");
        assert_eq!(coord.git_ref(), None);
    }

    #[test]
    fn test_error_display_names_input() {
        let msg = parse_locator("owner/").unwrap_err().to_string();
        assert!(msg.contains("owner/"), "Expected input in: {msg}");
    }
}
