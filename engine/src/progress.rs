//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which decouples the engine
//! from any specific output (console, log file, GUI). The engine decides
//! which callbacks to invoke based on the configured `Verbosity`; sinks only
//! format what they receive.

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::EngineError;
use crate::model::{CycleReport, EntryStatus, FileListingEntry};

/// Trait for receiving events from the monitor worker.
///
/// All methods are called synchronously from the worker thread.
pub trait ProgressCallback: Send + Sync {
    /// Called once when the worker starts monitoring.
    fn on_monitor_started(&self, config: &SyncConfig);

    /// Called when the interval elapsed and a cycle begins.
    fn on_cycle_started(&self, cycle_id: Uuid);

    /// Called when a cycle finished, whether or not it created a snapshot.
    fn on_cycle_completed(&self, report: &CycleReport);

    /// Called when a cycle was aborted by an error.
    fn on_cycle_failed(&self, cycle_id: Uuid, error: &EngineError);

    /// Called after a cycle with the per-file state of both generations.
    fn on_file_listing(&self, entries: &[FileListingEntry]);

    /// Called once when the worker has stopped.
    fn on_monitor_stopped(&self, config: &SyncConfig);
}

/// Sink that forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressCallback for LogProgress {
    fn on_monitor_started(&self, config: &SyncConfig) {
        info!(source = %config.source.display(), "monitoring started");
    }

    fn on_cycle_started(&self, cycle_id: Uuid) {
        info!(%cycle_id, "cycle started");
    }

    fn on_cycle_completed(&self, report: &CycleReport) {
        match &report.sync {
            Some(outcome) => info!(
                cycle_id = %report.id,
                folder = %outcome.folder.display(),
                files_updated = report.files_updated(),
                "new snapshot created"
            ),
            None => info!(cycle_id = %report.id, "no change detected"),
        }
    }

    fn on_cycle_failed(&self, cycle_id: Uuid, error: &EngineError) {
        warn!(%cycle_id, %error, "cycle failed");
    }

    fn on_file_listing(&self, entries: &[FileListingEntry]) {
        for entry in entries {
            match entry.status {
                EntryStatus::Unchanged => info!(path = %entry.path.display(), "existing file"),
                EntryStatus::New | EntryStatus::Modified => info!(
                    path = %entry.path.display(),
                    digest = entry.digest,
                    "updated file"
                ),
            }
        }
    }

    fn on_monitor_stopped(&self, config: &SyncConfig) {
        info!(source = %config.source.display(), "monitoring stopped");
    }
}
