//! In-memory [`RemoteTree`] used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::locator::RepoCoordinate;
use crate::remote::{RemoteError, RemoteTree, TreeEntry};

/// Content reference for an in-memory file at `path`.
pub(crate) fn mem_ref(path: &str) -> String {
    format!("mem://{path}")
}

#[derive(Debug, Default)]
pub(crate) struct FakeTree {
    listings: HashMap<String, Vec<TreeEntry>>,
    failing_dirs: HashSet<String>,
    contents: HashMap<String, Vec<u8>>,
    failing_files: HashSet<String>,
    panicking_files: HashSet<String>,
    listed: Mutex<Vec<String>>,
    fetches: AtomicUsize,
}

#[allow(clippy::unwrap_used)]
impl FakeTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a directory listing.
    pub(crate) fn dir(mut self, path: &str, entries: Vec<TreeEntry>) -> Self {
        self.listings.insert(path.to_string(), entries);
        self
    }

    /// Makes listing `path` fail with HTTP 500.
    pub(crate) fn failing_dir(mut self, path: &str) -> Self {
        self.failing_dirs.insert(path.to_string());
        self
    }

    /// Registers the bytes behind `mem_ref(path)`.
    pub(crate) fn content(mut self, path: &str, bytes: &[u8]) -> Self {
        self.contents.insert(mem_ref(path), bytes.to_vec());
        self
    }

    /// Makes fetching `mem_ref(path)` fail with HTTP 503.
    pub(crate) fn failing_file(mut self, path: &str) -> Self {
        self.failing_files.insert(mem_ref(path));
        self
    }

    /// Makes fetching `mem_ref(path)` panic.
    pub(crate) fn panicking_file(mut self, path: &str) -> Self {
        self.panicking_files.insert(mem_ref(path));
        self
    }

    /// Directories listed so far, in call order.
    pub(crate) fn listed(&self) -> Vec<String> {
        self.listed.lock().unwrap().clone()
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

/// File entry whose content lives at `mem_ref(path)`.
pub(crate) fn file(path: &str) -> TreeEntry {
    TreeEntry::file(path, mem_ref(path))
}

#[async_trait]
impl RemoteTree for FakeTree {
    #[allow(clippy::unwrap_used)]
    async fn list_directory(
        &self,
        _coord: &RepoCoordinate,
        path: &str,
    ) -> Result<Vec<TreeEntry>, RemoteError> {
        self.listed.lock().unwrap().push(path.to_string());
        tokio::task::yield_now().await;
        if self.failing_dirs.contains(path) {
            return Err(RemoteError::http_status(mem_ref(path), 500));
        }
        self.listings
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteError::http_status(mem_ref(path), 404))
    }

    async fn fetch_content(&self, content_ref: &str) -> Result<Vec<u8>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        assert!(
            !self.panicking_files.contains(content_ref),
            "fetch of {content_ref} panicked"
        );
        if self.failing_files.contains(content_ref) {
            return Err(RemoteError::http_status(content_ref, 503));
        }
        self.contents
            .get(content_ref)
            .cloned()
            .ok_or_else(|| RemoteError::http_status(content_ref, 404))
    }
}
