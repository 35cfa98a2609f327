//! Events a run reports to the presentation layer.
//!
//! The coordinator writes [`RunEvent`]s to an [`EventSink`]. Two sinks are
//! provided: [`ChannelSink`], which forwards to a Tokio channel, and any
//! `Fn(RunEvent)` closure.

use std::fmt;

use tokio::sync::mpsc;

use crate::summary::RunSummary;

/// Severity of a [`RunEvent::Log`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Progress detail.
    Info,
    /// Something was skipped but the run continues.
    Warning,
    /// The run cannot continue.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// Something that happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A file finished (successfully or not). `completed` strictly increases.
    Progress {
        /// Files finished so far, including this one.
        completed: usize,
        /// Files discovered.
        total: usize,
        /// Path of the file that just finished.
        current_path: String,
    },
    /// A message for the log pane.
    Log {
        /// Severity.
        level: LogLevel,
        /// Message text.
        message: String,
    },
    /// The run ended. Always the last event.
    Completed(RunSummary),
}

impl RunEvent {
    /// Shorthand for an info-level log event.
    pub fn info(message: impl Into<String>) -> Self {
        Self::Log {
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    /// Shorthand for a warning-level log event.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Log {
            level: LogLevel::Warning,
            message: message.into(),
        }
    }

    /// Shorthand for an error-level log event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Log {
            level: LogLevel::Error,
            message: message.into(),
        }
    }
}

/// Receiver of run events. Called from worker tasks, so it must be cheap and
/// must not block.
pub trait EventSink: Send + Sync {
    /// Delivers one event.
    fn emit(&self, event: RunEvent);
}

impl<F> EventSink for F
where
    F: Fn(RunEvent) + Send + Sync,
{
    fn emit(&self, event: RunEvent) {
        self(event);
    }
}

/// Sink forwarding events to an unbounded Tokio channel.
///
/// Events emitted after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its events arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: RunEvent) {
        // A closed receiver means nobody is listening any more.
        let _ = self.sender.send(event);
    }
}
