//! Memoized file snapshots keyed by `(revision, path)`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, trace};

use crate::error::Error;
use crate::types::FileSnapshot;

/// Read-only access to file contents at a revision. The only external collaborator.
pub trait RevisionSource: Send + Sync {
    /// Full content of `path` as it existed at `revision`.
    ///
    /// # Errors
    ///
    /// Returns `Error::FetchFailed` when the revision or path is unknown or the
    /// lookup fails, or `Error::FetchTimeout` when it does not answer in time.
    fn file_at(&self, revision: &str, path: &str) -> Result<String, Error>;
}

/// Cache key: revision, then repository path.
pub type SnapshotKey = (String, String);

/// One lazily filled slot per key. Concurrent fillers of the same slot wait for the first.
type Slot = Arc<OnceLock<Arc<FileSnapshot>>>;

/// Owned snapshot cache in front of a [`RevisionSource`].
///
/// Each key is fetched at most once per store, even under concurrent callers:
/// the slot for a key is created under the map lock, then filled outside it, so
/// other keys are never blocked by a slow fetch.
pub struct RevisionStore {
    /// Number of calls made to the source.
    fetches: AtomicUsize,
    /// Slot per key.
    slots: Mutex<HashMap<SnapshotKey, Slot>>,
    /// Where snapshots come from.
    source: Box<dyn RevisionSource>,
}

impl RevisionStore {
    /// Wrap a source with an empty cache.
    pub fn new(source: Box<dyn RevisionSource>) -> Self {
        return Self {
            fetches: AtomicUsize::new(0),
            slots: Mutex::new(HashMap::new()),
            source,
        };
    }

    /// Snapshot of `path` at `revision`. Never fails: errors become `Unavailable`.
    /// Repeated calls with the same key return the same `Arc`.
    pub fn fetch(&self, revision: &str, path: &str) -> Arc<FileSnapshot> {
        let slot = self.slot_for(revision, path);
        let snapshot = slot.get_or_init(|| return self.fetch_uncached(revision, path));
        return Arc::clone(snapshot);
    }

    /// Number of external fetches issued so far.
    pub fn fetch_count(&self) -> usize {
        return self.fetches.load(Ordering::Relaxed);
    }

    /// Call the source once and convert the result into a snapshot.
    fn fetch_uncached(&self, revision: &str, path: &str) -> Arc<FileSnapshot> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        return match self.source.file_at(revision, path) {
            Ok(content) => {
                trace!(revision, path, bytes = content.len(), "fetched snapshot");
                Arc::new(FileSnapshot::from_content(&content))
            },
            Err(e) => {
                debug!(revision, path, error = %e, "snapshot unavailable");
                Arc::new(FileSnapshot::Unavailable)
            },
        };
    }

    /// Warm the cache for `keys` with a bounded pool of `jobs` worker threads.
    /// Returns once every key has been fetched.
    pub fn prefetch(&self, keys: &[SnapshotKey], jobs: usize) {
        if keys.is_empty() {
            return;
        }

        let (tx, rx) = crossbeam_channel::unbounded::<&SnapshotKey>();
        for key in keys {
            // The receiver outlives this loop, so sending cannot fail.
            let _ = tx.send(key);
        }
        drop(tx);

        let workers = jobs.clamp(1, keys.len());
        debug!(keys = keys.len(), workers, "prefetching snapshots");
        std::thread::scope(|scope| {
            for _ in 0..workers {
                let rx = rx.clone();
                scope.spawn(move || {
                    while let Ok((revision, path)) = rx.recv() {
                        self.fetch(revision, path);
                    }
                });
            }
        });
    }

    /// Get or create the slot for a key.
    fn slot_for(&self, revision: &str, path: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots
            .entry((revision.to_string(), path.to_string()))
            .or_default();
        return Arc::clone(slot);
    }
}
