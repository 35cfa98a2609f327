//! Client side of the remote listing/content service.
//!
//! The walker and fetcher only see the [`RemoteTree`] trait, which exposes the
//! two logical operations a run needs:
//!
//! - `list_directory(coordinate, path)` - entries of one directory (or the
//!   single entry, when `path` names a file)
//! - `fetch_content(content_ref)` - raw bytes of one file
//!
//! [`GitHubClient`] implements it over HTTP with per-host rate limiting and
//! retry on transient failures.
//!
//! # Example
//!
//! ```no_run
//! use repofetch_core::remote::{GitHubClient, RemoteTree};
//! use repofetch_core::parse_locator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GitHubClient::builder().build()?;
//! let coord = parse_locator("rust-lang/log")?;
//! for entry in client.list_directory(&coord, "").await? {
//!     println!("{:?} {}", entry.kind, entry.path);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;

use async_trait::async_trait;

use crate::locator::RepoCoordinate;

mod client;
mod constants;
mod error;
pub mod rate_limiter;
mod retry;

pub use client::{GitHubClient, GitHubClientBuilder};
pub use constants::DEFAULT_API_URL;
pub use error::RemoteError;
pub use rate_limiter::RateLimiter;
pub use retry::{DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error};

/// Whether a listed entry is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file; has content to fetch.
    File,
    /// Directory; has entries to list.
    Directory,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Repository-relative, slash-separated path.
    pub path: String,
    /// File or directory.
    pub kind: EntryKind,
    /// Handle passed to [`RemoteTree::fetch_content`]. `None` for directories
    /// and for files the service offers no direct download for.
    pub content_ref: Option<String>,
}

impl TreeEntry {
    /// Creates a file entry.
    pub fn file(path: impl Into<String>, content_ref: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            content_ref: Some(content_ref.into()),
        }
    }

    /// Creates a directory entry.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            content_ref: None,
        }
    }
}

/// Opaque bearer token sent with every request.
///
/// `Debug` and `Display` never reveal the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a token. Surrounding whitespace is trimmed; an empty token yields `None`.
    #[must_use]
    pub fn new(token: &str) -> Option<Self> {
        let token = token.trim();
        (!token.is_empty()).then(|| Self(token.to_string()))
    }

    /// Value of the `Authorization` header for this credential.
    pub(crate) fn authorization_header(&self) -> String {
        format!("token {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// The two remote operations a run depends on.
#[async_trait]
pub trait RemoteTree: Send + Sync {
    /// Lists `path` (empty string for the repository root). A path naming a
    /// file yields a one-element listing for that file.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] on transport failure, non-2xx status, or an
    /// undecodable body.
    async fn list_directory(
        &self,
        coord: &RepoCoordinate,
        path: &str,
    ) -> Result<Vec<TreeEntry>, RemoteError>;

    /// Retrieves the raw bytes behind a file entry's `content_ref`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] on transport failure or non-2xx status.
    async fn fetch_content(&self, content_ref: &str) -> Result<Vec<u8>, RemoteError>;
}
