//! Orchestration of one run: walk, then fetch every discovered file.
//!
//! [`DownloadCoordinator`] drives a [`TreeWalker`] and then dispatches each
//! descriptor to a [`ContentFetcher`] as a Tokio task, bounded by a semaphore.
//! Progress and log events go to a caller-supplied [`EventSink`]; the final
//! [`RunSummary`] is both returned and emitted as [`RunEvent::Completed`].
//!
//! # Concurrency Model
//!
//! - Each fetch runs in its own Tokio task
//! - A semaphore permit is acquired before each dispatch
//! - Counters and the failure log share one lock; progress events are emitted
//!   while it is held, so `completed` strictly increases
//! - Only one run at a time may target a given destination directory
//!
//! # Example
//!
//! ```no_run
//! use repofetch_core::{Credential, start_run};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut handle = start_run("rust-lang/log", "downloaded_files", Credential::new("ghp_..."))?;
//! let mut events = handle.take_events().ok_or("events already taken")?;
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//! });
//! let summary = handle.wait().await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::events::{ChannelSink, EventSink, RunEvent};
use crate::fetch::{ContentFetcher, DownloadOutcome};
use crate::filter::PathFilter;
use crate::locator::{LocatorError, RepoCoordinate, parse_locator};
use crate::remote::{Credential, GitHubClient, RemoteError, RemoteTree};
use crate::summary::{FailureKind, FailureRecord, RunStatus, RunSummary};
use crate::walk::{DEFAULT_FAN_OUT, FileDescriptor, TreeWalker, WalkError};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default number of concurrent file fetches.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Destination directories with a run in progress, process-wide.
static ACTIVE_DESTINATIONS: LazyLock<DashMap<PathBuf, ()>> = LazyLock::new(DashMap::new);

/// Errors that prevent a run from starting or finishing.
///
/// Per-file and per-directory failures are not errors; they are recorded in
/// the [`RunSummary`].
#[derive(Debug, Error)]
pub enum RunError {
    /// The locator could not be parsed. Raised before any network call.
    #[error(transparent)]
    InvalidLocator(#[from] LocatorError),

    /// Another run is writing to the same destination directory.
    #[error("a run is already in progress for {}", destination.display())]
    RunInProgress {
        /// The contested directory.
        destination: PathBuf,
    },

    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The remote client could not be constructed.
    #[error("failed to set up remote client: {0}")]
    Client(#[source] RemoteError),

    /// The run task panicked or was aborted.
    #[error("run task failed: {0}")]
    Task(#[source] tokio::task::JoinError),
}

/// Cooperative cancellation signal shared between a run and its caller.
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. In-flight fetches complete; nothing new starts.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Removes its destination from the active registry on drop.
#[derive(Debug)]
struct DestinationGuard {
    key: PathBuf,
}

impl DestinationGuard {
    fn acquire(destination: &Path) -> Result<Self, RunError> {
        let key = std::path::absolute(destination).unwrap_or_else(|_| destination.to_path_buf());
        match ACTIVE_DESTINATIONS.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(RunError::RunInProgress {
                destination: destination.to_path_buf(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Ok(Self { key })
            }
        }
    }
}

impl Drop for DestinationGuard {
    fn drop(&mut self) {
        ACTIVE_DESTINATIONS.remove(&self.key);
    }
}

/// Counters and failures shared by fetch tasks.
#[derive(Debug, Default)]
struct RunState {
    completed: usize,
    succeeded: usize,
    failures: Vec<FailureRecord>,
}

/// Walks a repository and fetches every accepted file.
#[derive(Clone)]
pub struct DownloadCoordinator {
    remote: Arc<dyn RemoteTree>,
    filter: PathFilter,
    concurrency: usize,
    fan_out: usize,
}

impl std::fmt::Debug for DownloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadCoordinator")
            .field("concurrency", &self.concurrency)
            .field("fan_out", &self.fan_out)
            .finish_non_exhaustive()
    }
}

impl DownloadCoordinator {
    /// Creates a coordinator fetching up to `concurrency` files at once.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidConcurrency`] if the value is outside 1-100.
    pub fn new(remote: Arc<dyn RemoteTree>, concurrency: usize) -> Result<Self, RunError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(RunError::InvalidConcurrency { value: concurrency });
        }
        debug!(concurrency, "creating download coordinator");
        Ok(Self {
            remote,
            filter: PathFilter::new(),
            concurrency,
            fan_out: DEFAULT_FAN_OUT,
        })
    }

    /// Sets how many directories the walk lists concurrently.
    #[must_use]
    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(1);
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs to completion on the current task.
    ///
    /// Returns the summary even when the root listing fails (status
    /// [`RunStatus::Aborted`]) or the run is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::RunInProgress`] if another run targets `destination`.
    pub async fn run(
        &self,
        coord: &RepoCoordinate,
        start_path: &str,
        destination: &Path,
        sink: Arc<dyn EventSink>,
        cancel: CancelFlag,
    ) -> Result<RunSummary, RunError> {
        let guard = DestinationGuard::acquire(destination)?;
        let summary = self
            .run_guarded(coord, start_path, destination, sink, cancel)
            .await;
        drop(guard);
        Ok(summary)
    }

    /// Spawns the run and returns a handle for cancellation, events and the
    /// final summary. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::RunInProgress`] if another run targets `destination`.
    pub fn start(
        self,
        coord: RepoCoordinate,
        start_path: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Result<RunHandle, RunError> {
        let destination = destination.into();
        let start_path = start_path.into();
        let guard = DestinationGuard::acquire(&destination)?;

        let cancel = CancelFlag::new();
        let (sink, events) = ChannelSink::new();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let summary = self
                .run_guarded(&coord, &start_path, &destination, Arc::new(sink), task_cancel)
                .await;
            drop(guard);
            summary
        });

        Ok(RunHandle {
            cancel,
            events: Some(events),
            task,
        })
    }

    #[instrument(skip(self, sink, cancel), fields(coordinate = %coord, destination = %destination.display()))]
    async fn run_guarded(
        &self,
        coord: &RepoCoordinate,
        start_path: &str,
        destination: &Path,
        sink: Arc<dyn EventSink>,
        cancel: CancelFlag,
    ) -> RunSummary {
        info!("starting run");
        sink.emit(RunEvent::info(format!("Listing {coord}...")));

        let walker = TreeWalker::new(Arc::clone(&self.remote), self.filter)
            .with_fan_out(self.fan_out);
        let walked = match walker.walk(coord, start_path, &cancel).await {
            Ok(walked) => walked,
            Err(WalkError::TreeFetchFailed { path, source }) => {
                warn!(path = %path, error = %source, "run aborted: starting path could not be listed");
                sink.emit(RunEvent::error(format!(
                    "Failed to list repository {coord}: {source}"
                )));
                let summary = RunSummary::aborted(path, source.to_string());
                sink.emit(RunEvent::Completed(summary.clone()));
                return summary;
            }
        };

        let mut failed: Vec<FailureRecord> = walked
            .warnings
            .into_iter()
            .map(|warning| {
                sink.emit(RunEvent::warning(format!(
                    "Skipped directory {}: {}",
                    warning.path, warning.reason
                )));
                FailureRecord::new(warning.path, warning.reason, FailureKind::DirectoryListing)
            })
            .collect();

        let total = walked.descriptors.len();
        sink.emit(RunEvent::info(format!("Found {total} files to download")));

        let state = if walked.cancelled {
            RunState::default()
        } else {
            self.fetch_all(walked.descriptors, destination, &sink, &cancel)
                .await
        };

        let attempted = state.succeeded + state.failures.len();
        let status = if walked.cancelled || (cancel.is_cancelled() && attempted < total) {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        failed.extend(state.failures);

        let summary = RunSummary {
            total_discovered: total,
            succeeded: state.succeeded,
            failed,
            status,
        };
        info!(
            status = %summary.status,
            total = summary.total_discovered,
            succeeded = summary.succeeded,
            failed = summary.failed_files(),
            "run finished"
        );
        if status == RunStatus::Cancelled {
            sink.emit(RunEvent::warning("Download cancelled"));
        }
        sink.emit(RunEvent::Completed(summary.clone()));
        summary
    }

    async fn fetch_all(
        &self,
        descriptors: Vec<FileDescriptor>,
        destination: &Path,
        sink: &Arc<dyn EventSink>,
        cancel: &CancelFlag,
    ) -> RunState {
        let total = descriptors.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let state = Arc::new(Mutex::new(RunState::default()));
        let fetcher = ContentFetcher::new(Arc::clone(&self.remote));
        let mut handles = Vec::with_capacity(total);

        for descriptor in descriptors {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                warn!("semaphore closed unexpectedly");
                break;
            };
            if cancel.is_cancelled() {
                debug!("cancellation observed, no further dispatch");
                break;
            }

            let fetcher = fetcher.clone();
            let state = Arc::clone(&state);
            let sink = Arc::clone(sink);
            let cancel = cancel.clone();
            let destination = destination.to_path_buf();
            let path = descriptor.path().to_string();
            let recorded = Arc::new(AtomicBool::new(false));
            let task_recorded = Arc::clone(&recorded);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                if cancel.is_cancelled() {
                    return;
                }

                let outcome = fetcher.fetch(&descriptor, &destination).await;

                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                match outcome {
                    DownloadOutcome::Success { path, bytes } => {
                        debug!(file = %descriptor.path(), target = %path.display(), bytes, "downloaded");
                        state.succeeded += 1;
                    }
                    DownloadOutcome::Failed { reason } => {
                        warn!(file = %descriptor.path(), %reason, "file fetch failed");
                        sink.emit(RunEvent::warning(format!(
                            "Failed to download {}: {reason}",
                            descriptor.path()
                        )));
                        state.failures.push(FailureRecord::new(
                            descriptor.path(),
                            reason,
                            FailureKind::FileFetch,
                        ));
                    }
                }
                state.completed += 1;
                task_recorded.store(true, Ordering::SeqCst);
                sink.emit(RunEvent::Progress {
                    completed: state.completed,
                    total,
                    current_path: descriptor.path().to_string(),
                });
            });
            handles.push((path, recorded, handle));
        }

        for (path, recorded, handle) in handles {
            let Err(error) = handle.await else {
                continue;
            };
            warn!(file = %path, error = %error, "fetch task failed");
            // A task that panicked after recording its outcome is already counted.
            if !recorded.load(Ordering::SeqCst) {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                state.completed += 1;
                state.failures.push(FailureRecord::new(
                    path,
                    format!("task failed: {error}"),
                    FailureKind::FileFetch,
                ));
            }
        }

        match Arc::try_unwrap(state) {
            Ok(state) => state.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => {
                let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *state)
            }
        }
    }
}

/// Handle to a spawned run.
#[derive(Debug)]
pub struct RunHandle {
    cancel: CancelFlag,
    events: Option<mpsc::UnboundedReceiver<RunEvent>>,
    task: JoinHandle<RunSummary>,
}

impl RunHandle {
    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the run's cancellation flag, e.g. for a Ctrl-C handler.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Takes the event receiver. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<RunEvent>> {
        self.events.take()
    }

    /// Waits for the run to end.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Task`] if the run task panicked.
    pub async fn wait(self) -> Result<RunSummary, RunError> {
        self.task.await.map_err(RunError::Task)
    }
}

/// Parses `locator` and starts a run against the public GitHub API with
/// default settings. Must be called within a Tokio runtime.
///
/// # Errors
///
/// Returns [`RunError::InvalidLocator`] before any network call if the locator
/// does not parse, and [`RunError::RunInProgress`] if `destination` is busy.
pub fn start_run(
    locator: &str,
    destination: impl Into<PathBuf>,
    credential: Option<Credential>,
) -> Result<RunHandle, RunError> {
    let coord = parse_locator(locator)?;
    let client = GitHubClient::builder()
        .credential(credential)
        .build()
        .map_err(RunError::Client)?;
    DownloadCoordinator::new(Arc::new(client), DEFAULT_CONCURRENCY)?.start(coord, "", destination)
}
