//! Two-generation snapshot store.
//!
//! *last* holds the previous cycle's digests and *current* the cycle being
//! built. Both live behind one reader/writer lock: hashing units take the
//! write lock once per entry, and bulk reads take the read lock so they never
//! see a half-built generation.

use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::{EntryStatus, FileFingerprint, FileListingEntry, Snapshot};

#[derive(Debug, Default)]
struct Generations {
    last: Snapshot,
    current: Snapshot,
    /// The generation `last` replaced at the most recent promotion
    superseded: Snapshot,
    has_prior: bool,
}

/// Shared holder of the *last* and *current* snapshot generations.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: RwLock<Generations>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Generations> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Generations> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true once at least one generation has been promoted.
    pub fn has_prior(&self) -> bool {
        self.read().has_prior
    }

    /// Number of entries in the *last* generation.
    pub fn last_len(&self) -> usize {
        self.read().last.len()
    }

    /// Clear *current* so a new generation can be built.
    pub fn begin_generation(&self) {
        self.write().current.clear();
    }

    /// Store one fingerprint in *current*.
    pub fn record(&self, fingerprint: &FileFingerprint) {
        self.write()
            .current
            .insert(fingerprint.path.clone(), fingerprint.digest);
    }

    /// Clone of the *last* generation, taken under the read lock.
    pub fn working_copy(&self) -> Snapshot {
        self.read().last.clone()
    }

    /// Replace *last* with *current*.
    pub fn promote(&self) {
        let mut guard = self.write();
        let generations = &mut *guard;
        let promoted = generations.current.clone();
        generations.superseded = mem::replace(&mut generations.last, promoted);
        generations.has_prior = true;
    }

    /// Clone of the *last* generation.
    pub fn last(&self) -> Snapshot {
        self.read().last.clone()
    }

    /// Clone of the *current* generation.
    pub fn current(&self) -> Snapshot {
        self.read().current.clone()
    }

    /// Per-file view of *current* against the generation it replaced,
    /// sorted by path.
    pub fn listing(&self) -> Vec<FileListingEntry> {
        let generations = self.read();
        let mut entries: Vec<FileListingEntry> = generations
            .current
            .iter()
            .map(|(path, &digest)| {
                let status = match generations.superseded.get(path) {
                    None => EntryStatus::New,
                    Some(&previous) if previous != digest => EntryStatus::Modified,
                    Some(_) => EntryStatus::Unchanged,
                };
                FileListingEntry {
                    path: path.clone(),
                    digest,
                    status,
                }
            })
            .collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }
}

/// Working copy of *last* that fingerprints are matched against during a batch.
///
/// Matched entries are removed, so whatever remains after the batch was
/// deleted since the prior cycle.
#[derive(Debug)]
pub struct ComparisonBatch {
    remaining: Mutex<Snapshot>,
    differences: AtomicUsize,
}

impl ComparisonBatch {
    pub fn new(last: Snapshot) -> Self {
        ComparisonBatch {
            remaining: Mutex::new(last),
            differences: AtomicUsize::new(0),
        }
    }

    /// Match one fingerprint against the prior generation.
    pub fn compare(&self, fingerprint: &FileFingerprint) {
        let previous = self
            .remaining
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&fingerprint.path);

        match previous {
            Some(digest) if digest == fingerprint.digest => {}
            _ => {
                self.differences.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Total differences, counting unmatched prior entries as deletions.
    pub fn finish(self) -> usize {
        let deleted = self
            .remaining
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        self.differences.into_inner() + deleted
    }
}
