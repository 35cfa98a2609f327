//! Progress bar driven by run events.

use indicatif::{ProgressBar, ProgressStyle};
use repofetch_core::{LogLevel, RunEvent};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::debug;

const BAR_TEMPLATE: &str = "{bar:30.cyan/blue} {pos}/{len} {wide_msg}";

/// Consumes `events` until the run's final event or until the channel closes.
///
/// When `use_bar` is false the bar is hidden and events are only drained.
pub(crate) fn spawn_event_consumer(
    mut events: UnboundedReceiver<RunEvent>,
    use_bar: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let bar = if use_bar {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_message("listing repository...");
            bar
        } else {
            ProgressBar::hidden()
        };

        while let Some(event) = events.recv().await {
            if apply_event(&bar, &event) {
                break;
            }
        }
        bar.finish_and_clear();
    })
}

/// Updates `bar` for one event. Returns true for the final event.
fn apply_event(bar: &ProgressBar, event: &RunEvent) -> bool {
    match event {
        RunEvent::Progress {
            completed,
            total,
            current_path,
        } => {
            bar.set_length(*total as u64);
            bar.set_position(*completed as u64);
            bar.set_message(current_path.clone());
            false
        }
        RunEvent::Log {
            level: LogLevel::Info,
            message,
        } => {
            bar.set_message(message.clone());
            false
        }
        RunEvent::Log { level, message } => {
            debug!(%level, message, "run event");
            false
        }
        RunEvent::Completed(summary) => {
            debug!(status = %summary.status, "run finished");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use repofetch_core::{RunStatus, RunSummary};
    use tokio::sync::mpsc;

    use super::*;

    fn summary() -> RunSummary {
        RunSummary {
            total_discovered: 2,
            succeeded: 2,
            failed: Vec::new(),
            status: RunStatus::Completed,
        }
    }

    #[test]
    fn test_progress_event_moves_bar() {
        let bar = ProgressBar::hidden();
        let done = apply_event(
            &bar,
            &RunEvent::Progress {
                completed: 3,
                total: 7,
                current_path: "src/lib.rs".to_string(),
            },
        );
        assert!(!done);
        assert_eq!(bar.length(), Some(7));
        assert_eq!(bar.position(), 3);
        assert_eq!(bar.message(), "src/lib.rs");
    }

    #[test]
    fn test_info_log_sets_message_and_warning_does_not() {
        let bar = ProgressBar::hidden();
        apply_event(&bar, &RunEvent::info("found 4 files"));
        assert_eq!(bar.message(), "found 4 files");

        apply_event(&bar, &RunEvent::warning("skipped docs"));
        assert_eq!(bar.message(), "found 4 files");
    }

    #[test]
    fn test_completed_event_is_final() {
        let bar = ProgressBar::hidden();
        assert!(apply_event(&bar, &RunEvent::Completed(summary())));
    }

    #[tokio::test]
    async fn test_consumer_stops_on_completed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_event_consumer(rx, false);

        tx.send(RunEvent::info("listing")).ok();
        tx.send(RunEvent::Completed(summary())).ok();

        // The sender is still alive, so only the final event ends the task.
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("consumer should stop after the final event")
            .expect("consumer task should not panic");
        drop(tx);
    }

    #[tokio::test]
    async fn test_consumer_stops_when_channel_closes() {
        let (tx, rx) = mpsc::unbounded_channel::<RunEvent>();
        let handle = spawn_event_consumer(rx, false);
        drop(tx);
        handle.await.expect("consumer task should not panic");
    }
}
