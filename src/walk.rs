//! Recursive discovery of the files under a starting path.
//!
//! [`TreeWalker`] issues one listing request per directory and returns the
//! flat list of files that passed the [`PathFilter`]. A failed subdirectory
//! listing is recorded as a [`DirectoryWarning`] and its siblings are still
//! walked; a failed listing of the starting path is fatal.
//!
//! The walk keeps an explicit stack of pending work rather than recursing, so
//! tree depth never grows the call stack. Each round pops up to `fan_out`
//! directories and lists them concurrently. With a fan-out of 1 the result is
//! exactly depth-first in the order the remote returned entries.

use std::sync::Arc;

use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::coordinator::CancelFlag;
use crate::filter::PathFilter;
use crate::locator::RepoCoordinate;
use crate::remote::{EntryKind, RemoteError, RemoteTree, TreeEntry};

/// Directories listed concurrently per round unless configured otherwise.
pub const DEFAULT_FAN_OUT: usize = 4;

/// Fatal walk failure.
#[derive(Debug, Error)]
pub enum WalkError {
    /// The starting path could not be listed, so nothing is discoverable.
    #[error("failed to list '{path}': {source}")]
    TreeFetchFailed {
        /// The starting path (empty for the repository root).
        path: String,
        /// The listing error.
        #[source]
        source: RemoteError,
    },
}

/// A file entry that passed the filter and is slated for retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    entry: TreeEntry,
}

impl FileDescriptor {
    /// Accepts `entry` if it is a file the filter lets through.
    #[must_use]
    pub fn from_entry(entry: TreeEntry, filter: &PathFilter) -> Option<Self> {
        (entry.kind == EntryKind::File && filter.should_include(&entry.path))
            .then_some(Self { entry })
    }

    /// Repository-relative path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.entry.path
    }

    /// Final path segment.
    #[must_use]
    pub fn basename(&self) -> &str {
        self.entry
            .path
            .rsplit('/')
            .next()
            .unwrap_or(&self.entry.path)
    }

    /// Handle for [`RemoteTree::fetch_content`], if the remote offered one.
    #[must_use]
    pub fn content_ref(&self) -> Option<&str> {
        self.entry.content_ref.as_deref()
    }
}

/// A subdirectory that could not be listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryWarning {
    /// Path of the directory.
    pub path: String,
    /// Why listing it failed.
    pub reason: String,
}

/// Everything a walk found.
#[derive(Debug, Default)]
pub struct WalkResult {
    /// Accepted files.
    pub descriptors: Vec<FileDescriptor>,
    /// Subdirectories whose listing failed.
    pub warnings: Vec<DirectoryWarning>,
    /// Files rejected by the filter.
    pub filtered: usize,
    /// Whether the walk stopped early because of cancellation.
    pub cancelled: bool,
}

/// Pending unit of work on the walk stack.
enum Pending {
    List(String),
    Emit(TreeEntry),
}

/// Enumerates files under a path.
#[derive(Clone)]
pub struct TreeWalker {
    remote: Arc<dyn RemoteTree>,
    filter: PathFilter,
    fan_out: usize,
}

impl std::fmt::Debug for TreeWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWalker")
            .field("filter", &self.filter)
            .field("fan_out", &self.fan_out)
            .finish_non_exhaustive()
    }
}

impl TreeWalker {
    /// Creates a walker listing through `remote`.
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteTree>, filter: PathFilter) -> Self {
        Self {
            remote,
            filter,
            fan_out: DEFAULT_FAN_OUT,
        }
    }

    /// Sets how many directories are listed concurrently. Clamped to at least 1.
    #[must_use]
    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(1);
        self
    }

    /// Walks `start_path` (empty for the repository root).
    ///
    /// Cancellation is checked before each round of listings; a cancelled walk
    /// returns what it found so far with `cancelled` set.
    ///
    /// # Errors
    ///
    /// Returns [`WalkError::TreeFetchFailed`] if `start_path` itself cannot be
    /// listed.
    #[instrument(skip(self, cancel), fields(coordinate = %coord, fan_out = self.fan_out))]
    pub async fn walk(
        &self,
        coord: &RepoCoordinate,
        start_path: &str,
        cancel: &CancelFlag,
    ) -> Result<WalkResult, WalkError> {
        let start_path = start_path.trim_matches('/');
        let mut result = WalkResult::default();
        let mut stack = vec![Pending::List(start_path.to_string())];
        let mut at_root = true;

        while !stack.is_empty() {
            if cancel.is_cancelled() {
                info!(
                    discovered = result.descriptors.len(),
                    pending = stack.len(),
                    "walk cancelled"
                );
                result.cancelled = true;
                break;
            }

            let batch = self.next_batch(&mut stack, &mut result);
            if batch.is_empty() {
                continue;
            }

            let listings = join_all(
                batch
                    .iter()
                    .map(|path| self.remote.list_directory(coord, path)),
            )
            .await;

            // Reverse so the first directory of the batch ends on top.
            for (path, listing) in batch.into_iter().zip(listings).rev() {
                match listing {
                    Ok(entries) => {
                        debug!(path = %path, entries = entries.len(), "listed directory");
                        stack.extend(entries.into_iter().rev().map(|entry| match entry.kind {
                            EntryKind::Directory => Pending::List(entry.path),
                            EntryKind::File => Pending::Emit(entry),
                        }));
                    }
                    Err(source) if at_root => {
                        return Err(WalkError::TreeFetchFailed { path, source });
                    }
                    Err(error) => {
                        warn!(path = %path, error = %error, "skipping directory that could not be listed");
                        result.warnings.push(DirectoryWarning {
                            path,
                            reason: error.to_string(),
                        });
                    }
                }
            }
            at_root = false;
        }

        info!(
            files = result.descriptors.len(),
            filtered = result.filtered,
            directory_warnings = result.warnings.len(),
            "walk finished"
        );
        Ok(result)
    }

    /// Pops up to `fan_out` directories, emitting files met on the way.
    fn next_batch(&self, stack: &mut Vec<Pending>, result: &mut WalkResult) -> Vec<String> {
        let mut batch = Vec::with_capacity(self.fan_out);
        while batch.len() < self.fan_out {
            match stack.pop() {
                Some(Pending::List(path)) => batch.push(path),
                Some(Pending::Emit(entry)) => self.accept(entry, result),
                None => break,
            }
        }
        batch
    }

    fn accept(&self, entry: TreeEntry, result: &mut WalkResult) {
        let path = entry.path.clone();
        match FileDescriptor::from_entry(entry, &self.filter) {
            Some(descriptor) => result.descriptors.push(descriptor),
            None => {
                debug!(path = %path, "filtered out");
                result.filtered += 1;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::test_support::{FakeTree, file};

    fn coord() -> RepoCoordinate {
        RepoCoordinate::new("ownerA", "repoB").unwrap()
    }

    fn paths(result: &WalkResult) -> Vec<&str> {
        result.descriptors.iter().map(FileDescriptor::path).collect()
    }

    fn sample_tree() -> FakeTree {
        FakeTree::new()
            .dir(
                "",
                vec![file("a.png"), file("b.go"), TreeEntry::directory("sub")],
            )
            .dir("sub", vec![file("sub/c.zip"), file("sub/d.txt")])
    }

    async fn walk(tree: FakeTree, fan_out: usize) -> Result<WalkResult, WalkError> {
        TreeWalker::new(Arc::new(tree), PathFilter::new())
            .with_fan_out(fan_out)
            .walk(&coord(), "", &CancelFlag::new())
            .await
    }

    #[tokio::test]
    async fn test_walk_filters_denied_extensions() {
        let result = walk(sample_tree(), 1).await.unwrap();
        assert_eq!(paths(&result), vec!["b.go", "sub/d.txt"]);
        assert_eq!(result.filtered, 2);
        assert!(result.warnings.is_empty());
        assert!(!result.cancelled);
    }

    #[tokio::test]
    async fn test_walk_with_fan_out_yields_same_set() {
        let result = walk(sample_tree(), 8).await.unwrap();
        let found: HashSet<&str> = paths(&result).into_iter().collect();
        assert_eq!(found, HashSet::from(["b.go", "sub/d.txt"]));
    }

    #[tokio::test]
    async fn test_subdirectory_failure_is_a_warning() {
        let tree = sample_tree().failing_dir("sub");
        let result = walk(tree, 1).await.unwrap();

        assert_eq!(paths(&result), vec!["b.go"]);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].path, "sub");
        assert!(result.warnings[0].reason.contains("500"));
    }

    #[tokio::test]
    async fn test_root_failure_is_fatal() {
        let tree = sample_tree().failing_dir("");
        let error = walk(tree, 1).await.unwrap_err();
        let WalkError::TreeFetchFailed { path, source } = error;
        assert_eq!(path, "");
        assert_eq!(source.status(), Some(500));
    }

    #[tokio::test]
    async fn test_order_is_depth_first_in_listing_order() {
        let tree = FakeTree::new()
            .dir(
                "",
                vec![
                    TreeEntry::directory("x"),
                    file("m.rs"),
                    TreeEntry::directory("y"),
                ],
            )
            .dir("x", vec![file("x/1.rs"), TreeEntry::directory("x/deep")])
            .dir("x/deep", vec![file("x/deep/2.rs")])
            .dir("y", vec![file("y/3.rs")]);

        let walker = TreeWalker::new(Arc::new(tree), PathFilter::new()).with_fan_out(1);
        let result = walker.walk(&coord(), "", &CancelFlag::new()).await.unwrap();
        assert_eq!(
            paths(&result),
            vec!["x/1.rs", "x/deep/2.rs", "m.rs", "y/3.rs"]
        );
    }

    #[tokio::test]
    async fn test_each_directory_listed_once() {
        let tree = Arc::new(sample_tree());
        let walker = TreeWalker::new(tree.clone(), PathFilter::new()).with_fan_out(1);
        walker.walk(&coord(), "", &CancelFlag::new()).await.unwrap();
        assert_eq!(tree.listed(), vec!["", "sub"]);
    }

    #[tokio::test]
    async fn test_start_path_naming_a_file() {
        let tree = FakeTree::new().dir("docs/README.md", vec![file("docs/README.md")]);
        let walker = TreeWalker::new(Arc::new(tree), PathFilter::new());
        let result = walker
            .walk(&coord(), "/docs/README.md", &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(paths(&result), vec!["docs/README.md"]);
    }

    #[tokio::test]
    async fn test_cancelled_walk_stops_before_listing() {
        let tree = Arc::new(sample_tree());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let walker = TreeWalker::new(tree.clone(), PathFilter::new());
        let result = walker.walk(&coord(), "", &cancel).await.unwrap();
        assert!(result.cancelled);
        assert!(result.descriptors.is_empty());
        assert!(tree.listed().is_empty());
    }

    #[tokio::test]
    async fn test_empty_directory_yields_nothing() {
        let tree = FakeTree::new().dir("", vec![]);
        let result = walk(tree, 1).await.unwrap();
        assert!(result.descriptors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_descriptor_rejects_directories_and_denied_files() {
        let filter = PathFilter::new();
        assert!(FileDescriptor::from_entry(TreeEntry::directory("src"), &filter).is_none());
        assert!(FileDescriptor::from_entry(file("logo.PNG"), &filter).is_none());

        let descriptor = FileDescriptor::from_entry(file("src/lib.rs"), &filter).unwrap();
        assert_eq!(descriptor.basename(), "lib.rs");
        assert_eq!(descriptor.content_ref(), Some("mem://src/lib.rs"));
    }
}
