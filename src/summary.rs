//! Aggregate result of one run.

use std::fmt;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every discovered file was attempted.
    Completed,
    /// Stopped early on request; later files were never dispatched.
    Cancelled,
    /// The starting path could not be listed, so nothing was discovered.
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

/// Which stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The starting path could not be listed. Fatal.
    TreeFetch,
    /// A subdirectory could not be listed. Its contents were skipped.
    DirectoryListing,
    /// A file could not be fetched or written.
    FileFetch,
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Repository-relative path the failure is attributed to.
    pub path: String,
    /// Human-readable cause, carrying the HTTP status or error class.
    pub reason: String,
    /// Stage that failed.
    pub kind: FailureKind,
}

impl FailureRecord {
    /// Creates a record.
    pub fn new(path: impl Into<String>, reason: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
            kind,
        }
    }
}

/// Counts and failures of a finished run.
///
/// Content is independent of the order in which files completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Files that passed the filter.
    pub total_discovered: usize,
    /// Files fetched and written.
    pub succeeded: usize,
    /// Directory warnings and file failures, in the order they were recorded.
    pub failed: Vec<FailureRecord>,
    /// How the run ended.
    pub status: RunStatus,
}

impl RunSummary {
    /// Summary of a run whose root listing failed.
    pub fn aborted(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            total_discovered: 0,
            succeeded: 0,
            failed: vec![FailureRecord::new(path, reason, FailureKind::TreeFetch)],
            status: RunStatus::Aborted,
        }
    }

    /// True only when the run was not cancelled or aborted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Number of files that failed to fetch or write.
    #[must_use]
    pub fn failed_files(&self) -> usize {
        self.records(FailureKind::FileFetch).count()
    }

    /// Number of subdirectories that could not be listed.
    #[must_use]
    pub fn directory_warnings(&self) -> usize {
        self.records(FailureKind::DirectoryListing).count()
    }

    /// Failures of one kind.
    pub fn records(&self, kind: FailureKind) -> impl Iterator<Item = &FailureRecord> {
        self.failed.iter().filter(move |record| record.kind == kind)
    }

    /// Discovered files that were neither fetched nor failed.
    #[must_use]
    pub fn not_attempted(&self) -> usize {
        self.total_discovered
            .saturating_sub(self.succeeded + self.failed_files())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} of {} files downloaded, {} failed",
            self.status,
            self.succeeded,
            self.total_discovered,
            self.failed_files()
        )?;
        let warnings = self.directory_warnings();
        if warnings > 0 {
            write!(f, ", {warnings} directories skipped")?;
        }
        Ok(())
    }
}
