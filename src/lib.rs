//! Repofetch Core Library
//!
//! This library downloads every file of one repository snapshot into a local
//! directory. A run discovers the remote tree through the directory-listing
//! API, filters it, fetches file contents, and reports progress and partial
//! failures without aborting on them.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`locator`] - Parses a repository URL or `owner/name` slug
//! - [`filter`] - Extension denylist for binary and media files
//! - [`remote`] - Listing/content service client with retry and rate limiting
//! - [`walk`] - Recursive tree discovery with per-directory failure tolerance
//! - [`fetch`] - Retrieves one file and writes it to the destination
//! - [`coordinator`] - Orchestrates a run, progress, cancellation
//! - [`events`] / [`summary`] - What a run reports back to its caller
//! - [`history`] / [`config`] - Recently used locators and file defaults

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod coordinator;
pub mod events;
pub mod fetch;
pub mod filter;
pub mod history;
pub mod locator;
pub mod remote;
pub mod summary;
pub mod walk;

mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use coordinator::{
    CancelFlag, DEFAULT_CONCURRENCY, DownloadCoordinator, RunError, RunHandle, start_run,
};
pub use events::{ChannelSink, EventSink, LogLevel, RunEvent};
pub use fetch::{ContentFetcher, DownloadOutcome};
pub use filter::PathFilter;
pub use locator::{LocatorError, RepoCoordinate, parse_locator};
pub use remote::{
    Credential, DEFAULT_MAX_ATTEMPTS, EntryKind, GitHubClient, RateLimiter, RemoteError,
    RemoteTree, RetryPolicy, TreeEntry,
};
pub use summary::{FailureKind, FailureRecord, RunStatus, RunSummary};
pub use walk::{DirectoryWarning, FileDescriptor, TreeWalker, WalkError, WalkResult};
