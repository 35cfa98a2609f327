//! Retrieval and persistence of single files.
//!
//! [`ContentFetcher::fetch`] never returns an error: every transport, status
//! or write problem becomes [`DownloadOutcome::Failed`] with a reason naming
//! the HTTP status or error class.
//!
//! Files are flattened into the destination directory by basename. Two paths
//! sharing a basename overwrite each other; the later write wins.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use crate::remote::RemoteTree;
use crate::walk::FileDescriptor;

/// Suffix of the temporary sibling a file is written to before the rename.
const PART_SUFFIX: &str = ".part";

/// Distinguishes concurrent writes that target the same basename.
static PART_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Result of fetching one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Written to `path`.
    Success {
        /// Final location on disk.
        path: PathBuf,
        /// Bytes written.
        bytes: usize,
    },
    /// Not written.
    Failed {
        /// HTTP status or error class, plus detail.
        reason: String,
    },
}

impl DownloadOutcome {
    /// Whether the file was written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Fetches file bytes through a [`RemoteTree`] and writes them to disk.
#[derive(Clone)]
pub struct ContentFetcher {
    remote: Arc<dyn RemoteTree>,
}

impl std::fmt::Debug for ContentFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentFetcher").finish_non_exhaustive()
    }
}

impl ContentFetcher {
    /// Creates a fetcher.
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteTree>) -> Self {
        Self { remote }
    }

    /// Fetches `descriptor` and writes it to `destination/basename`, creating
    /// `destination` if needed.
    ///
    /// The bytes go to a hidden `.part` sibling unique to this write and are
    /// renamed into place, so the final path never holds a truncated or mixed
    /// file.
    #[instrument(skip(self, descriptor), fields(path = %descriptor.path(), destination = %destination.display()))]
    pub async fn fetch(&self, descriptor: &FileDescriptor, destination: &Path) -> DownloadOutcome {
        let Some(content_ref) = descriptor.content_ref() else {
            return failed("no content reference");
        };
        let Some(file_name) = sanitize_basename(descriptor.basename()) else {
            return failed(format!("unusable file name '{}'", descriptor.basename()));
        };

        let bytes = match self.remote.fetch_content(content_ref).await {
            Ok(bytes) => bytes,
            Err(error) => return failed(error.to_string()),
        };

        let target = destination.join(&file_name);
        match write_atomically(destination, &file_name, &bytes).await {
            Ok(()) => {
                debug!(target = %target.display(), bytes = bytes.len(), "file written");
                DownloadOutcome::Success {
                    path: target,
                    bytes: bytes.len(),
                }
            }
            Err(error) => failed(format!("write error for {}: {error}", target.display())),
        }
    }
}

fn failed(reason: impl Into<String>) -> DownloadOutcome {
    DownloadOutcome::Failed {
        reason: reason.into(),
    }
}

async fn write_atomically(
    destination: &Path,
    file_name: &str,
    bytes: &[u8],
) -> std::io::Result<()> {
    tokio::fs::create_dir_all(destination).await?;

    let target = destination.join(file_name);
    let part = destination.join(part_file_name(file_name));

    let written = async {
        let mut file = tokio::fs::File::create(&part).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&part, &target).await
    }
    .await;

    if let Err(error) = &written {
        warn!(part = %part.display(), error = %error, "removing partial file after write error");
        let _ = tokio::fs::remove_file(&part).await;
    }
    written
}

/// Hidden temporary name for one write of `file_name`.
fn part_file_name(file_name: &str) -> String {
    let sequence = PART_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(".{file_name}.{}-{sequence}{PART_SUFFIX}", std::process::id())
}

/// Makes a remote basename safe to join onto the destination directory.
///
/// Separators, reserved and control characters become `_`. Names that would
/// resolve to the directory itself or its parent are rejected.
pub(crate) fn sanitize_basename(name: &str) -> Option<String> {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let mut components = Path::new(&sanitized).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(sanitized),
        _ => None,
    }
}
