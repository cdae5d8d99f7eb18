//! Core data model for monitoring cycles.
//!
//! This module defines the data passed between the engine's stages:
//! - FileFingerprint and Snapshot: per-file digests for one generation
//! - CycleTask: what the scanner found for one cycle
//! - Detection and CycleReport: what a cycle decided and did
//! - WorkerState: the background worker's lifecycle

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::fs_ops::CopySummary;

/// Mapping from absolute file path to content digest.
pub type Snapshot = HashMap<PathBuf, u64>;

/// A file's content digest, computed fresh every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFingerprint {
    /// Absolute, normalized file path
    pub path: PathBuf,

    /// 64-bit content digest; zero when the file could not be read (and for
    /// an empty file under CRC-64)
    pub digest: u64,
}

impl FileFingerprint {
    pub fn new(path: PathBuf, digest: u64) -> Self {
        FileFingerprint { path, digest }
    }

    /// Returns true if the digest is the zero marker written for a file that
    /// vanished or could not be read while hashing.
    ///
    /// A readable empty file also digests to zero under CRC-64, so with that
    /// algorithm an empty file and a missing one look the same here. Both
    /// compare equal across cycles, so neither causes a spurious difference.
    pub fn is_unreadable(&self) -> bool {
        self.digest == 0
    }
}

/// Files to fingerprint and entries to copy, derived by one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleTask {
    /// Every file whose content is fingerprinted this cycle
    pub hash_set: Vec<PathBuf>,

    /// Top-level files and allowed subfolder roots copied when a sync runs
    pub copy_set: Vec<PathBuf>,
}

/// Why the detector decided the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionReason {
    /// No prior snapshot existed
    FirstCycle,
    /// The number of monitored files differs from the prior snapshot
    FileCountChanged { previous: usize, current: usize },
    /// Same number of files, but at least one digest or path differs
    ContentChanged,
    /// Nothing changed since the prior snapshot
    Unchanged,
}

/// Outcome of the change detector for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// Whether a snapshot copy should be made
    pub sync_needed: bool,

    /// New, modified and deleted files relative to the prior snapshot
    pub differences: usize,

    pub reason: DetectionReason,
}

/// Result of copying the fileset into a snapshot folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The timestamped folder that received the copy
    pub folder: PathBuf,

    pub summary: CopySummary,
}

/// Everything one completed cycle produced.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Unique identifier for this cycle
    pub id: Uuid,

    pub started_at: DateTime<Local>,

    pub finished_at: DateTime<Local>,

    pub detection: Detection,

    /// Present when the detector asked for a sync and the copy ran
    pub sync: Option<SyncOutcome>,
}

impl CycleReport {
    /// Number of differing files when a snapshot was created, zero otherwise.
    pub fn files_updated(&self) -> usize {
        if self.sync.is_some() {
            self.detection.differences
        } else {
            0
        }
    }
}

/// How a file in the current snapshot relates to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Path absent from the previous snapshot
    New,
    /// Path present with a different digest
    Modified,
    /// Path present with the same digest
    Unchanged,
}

/// One line of the detailed per-file listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileListingEntry {
    pub path: PathBuf,
    pub digest: u64,
    pub status: EntryStatus,
}

/// Lifecycle of the background monitor worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// No worker thread exists
    #[default]
    Idle,
    /// Worker thread is looping
    Running,
    /// Stop signalled, waiting for the thread to finish its cycle
    StopRequested,
    /// Worker thread has exited and been joined
    Stopped,
}

impl WorkerState {
    /// Returns true if `start` may spawn a new worker from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, WorkerState::Idle | WorkerState::Stopped)
    }

    /// Returns true if `stop` may be requested from this state.
    pub fn can_stop(&self) -> bool {
        matches!(self, WorkerState::Running)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "Idle"),
            WorkerState::Running => write!(f, "Running"),
            WorkerState::StopRequested => write!(f, "StopRequested"),
            WorkerState::Stopped => write!(f, "Stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_state_transitions() {
        let cases = [
            (WorkerState::Idle, true, false),
            (WorkerState::Running, false, true),
            (WorkerState::StopRequested, false, false),
            (WorkerState::Stopped, true, false),
        ];
        for (state, can_start, can_stop) in cases {
            assert_eq!(state.can_start(), can_start, "can_start for {}", state);
            assert_eq!(state.can_stop(), can_stop, "can_stop for {}", state);
        }
        assert_eq!(WorkerState::default(), WorkerState::Idle);
    }

    #[test]
    fn test_files_updated_only_counts_synced_cycles() {
        let now = Local::now();
        let mut report = CycleReport {
            id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            detection: Detection {
                sync_needed: true,
                differences: 3,
                reason: DetectionReason::ContentChanged,
            },
            sync: None,
        };
        assert_eq!(report.files_updated(), 0);

        report.sync = Some(SyncOutcome {
            folder: PathBuf::from("/dest/data 2024-01-01 00.00.00"),
            summary: CopySummary::default(),
        });
        assert_eq!(report.files_updated(), 3);
    }
}
