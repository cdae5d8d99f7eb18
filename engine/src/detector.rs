//! Change detection.
//!
//! Fingerprints the hash-set of a cycle in parallel into the *current*
//! generation, compares it with *last*, promotes *current*, and decides
//! whether the cycle needs a snapshot copy.

use tracing::debug;

use crate::checksums::{self, DigestAlgorithm};
use crate::model::{CycleTask, Detection, DetectionReason};
use crate::pool::HashPool;
use crate::snapshot::{ComparisonBatch, SnapshotStore};

/// Build the next snapshot generation and decide whether a sync is needed.
///
/// Hashing always runs, even when the file count alone already decides the
/// outcome, so *last* is replaced by a complete *current* in every branch.
pub fn detect(
    task: &CycleTask,
    store: &SnapshotStore,
    pool: &HashPool,
    algorithm: DigestAlgorithm,
) -> Detection {
    let first_cycle = !store.has_prior();
    let previous = store.last_len();
    let current = task.hash_set.len();

    store.begin_generation();
    let batch = ComparisonBatch::new(store.working_copy());

    pool.run_all(&task.hash_set, |path| {
        let fingerprint = checksums::fingerprint_file(path, algorithm);
        store.record(&fingerprint);
        batch.compare(&fingerprint);
    });

    let differences = batch.finish();
    store.promote();

    let reason = if first_cycle {
        DetectionReason::FirstCycle
    } else if current != previous {
        DetectionReason::FileCountChanged { previous, current }
    } else if differences > 0 {
        DetectionReason::ContentChanged
    } else {
        DetectionReason::Unchanged
    };

    debug!(?reason, differences, files = current, "change detection finished");
    Detection {
        sync_needed: reason != DetectionReason::Unchanged,
        differences,
        reason,
    }
}
