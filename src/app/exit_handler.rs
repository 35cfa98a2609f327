//! Exit code logic for the repofetch process.
//!
//! Single responsibility: map a run summary to the process exit outcome.

use repofetch_core::{RunStatus, RunSummary};

use crate::ProcessExit;

/// Determines the process exit outcome from a finished run.
///
/// Aborted and cancelled runs fail. A completed run succeeds when nothing was
/// recorded as failed, is partial when some files still arrived, and fails
/// otherwise.
pub(crate) fn determine_exit_outcome(summary: &RunSummary) -> ProcessExit {
    if summary.status != RunStatus::Completed {
        return ProcessExit::Failure;
    }
    if summary.failed.is_empty() {
        ProcessExit::Success
    } else if summary.succeeded > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

#[cfg(test)]
mod tests {
    use repofetch_core::{FailureKind, FailureRecord};

    use super::*;

    fn summary(succeeded: usize, failures: usize, status: RunStatus) -> RunSummary {
        RunSummary {
            total_discovered: succeeded + failures,
            succeeded,
            failed: (0..failures)
                .map(|i| FailureRecord::new(format!("f{i}"), "HTTP 500", FailureKind::FileFetch))
                .collect(),
            status,
        }
    }

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(
            determine_exit_outcome(&summary(3, 0, RunStatus::Completed)),
            ProcessExit::Success
        );
    }

    #[test]
    fn test_exit_outcome_success_for_empty_repository() {
        assert_eq!(
            determine_exit_outcome(&summary(0, 0, RunStatus::Completed)),
            ProcessExit::Success
        );
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        assert_eq!(
            determine_exit_outcome(&summary(2, 1, RunStatus::Completed)),
            ProcessExit::Partial
        );
    }

    #[test]
    fn test_exit_outcome_failure_when_all_failed() {
        assert_eq!(
            determine_exit_outcome(&summary(0, 2, RunStatus::Completed)),
            ProcessExit::Failure
        );
    }

    #[test]
    fn test_exit_outcome_failure_when_cancelled_or_aborted() {
        assert_eq!(
            determine_exit_outcome(&summary(2, 0, RunStatus::Cancelled)),
            ProcessExit::Failure
        );
        assert_eq!(
            determine_exit_outcome(&RunSummary::aborted("", "HTTP 404")),
            ProcessExit::Failure
        );
    }
}
