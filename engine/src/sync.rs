//! Snapshot copy.
//!
//! Creates `<destination>/<source name> <timestamp>` and copies the cycle's
//! copy-set into it. Every triggered cycle copies the full allowed fileset.

use std::path::Path;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::EngineError;
use crate::fs_ops::{self, CopySummary};
use crate::model::{CycleTask, SyncOutcome};

/// Timestamp format for snapshot folders; no `:` so the name is valid on Windows.
pub const FOLDER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H.%M.%S";

/// Folder name for a snapshot of `source` taken at `now`.
pub fn snapshot_folder_name(source: &Path, now: &DateTime<Local>) -> String {
    let base = fs_ops::base_name(source);
    let base = if base.is_empty() { "root".to_string() } else { base };
    format!("{} {}", base, now.format(FOLDER_TIMESTAMP_FORMAT))
}

/// Copy the cycle's copy-set into a new snapshot folder stamped with the current time.
pub fn execute(config: &SyncConfig, task: &CycleTask) -> Result<SyncOutcome, EngineError> {
    execute_at(config, task, &Local::now())
}

/// Copy the cycle's copy-set into a new snapshot folder stamped with `now`.
///
/// Entries that vanished since the scan are skipped. Individual file failures
/// are counted in the summary and do not abort the copy.
///
/// # Errors
/// `SnapshotFolderCreation` if the snapshot folder cannot be created.
pub fn execute_at(
    config: &SyncConfig,
    task: &CycleTask,
    now: &DateTime<Local>,
) -> Result<SyncOutcome, EngineError> {
    let folder = config
        .destination()
        .join(snapshot_folder_name(&config.source, now));

    fs_ops::ensure_dir(&folder).map_err(|e| match e {
        EngineError::DirectoryCreationFailed { path, source } => {
            EngineError::SnapshotFolderCreation { path, source }
        }
        other => other,
    })?;

    let mut summary = CopySummary::default();
    for entry in &task.copy_set {
        let target = folder.join(fs_ops::base_name(entry));
        if fs_ops::is_file(entry) {
            match fs_ops::copy_file_with_metadata(entry, &target) {
                Ok(bytes) => {
                    summary.files_copied += 1;
                    summary.bytes_copied += bytes;
                }
                Err(e) => {
                    warn!(path = %entry.display(), error = %e, "file not copied");
                    summary.skipped += 1;
                }
            }
        } else if fs_ops::is_dir(entry) {
            match fs_ops::copy_tree(entry, &target) {
                Ok(nested) => summary.absorb(nested),
                Err(e) => {
                    warn!(path = %entry.display(), error = %e, "folder not copied");
                    summary.skipped += 1;
                }
            }
        } else {
            debug!(path = %entry.display(), "entry vanished before copy");
        }
    }

    info!(
        folder = %folder.display(),
        files = summary.files_copied,
        bytes = summary.bytes_copied,
        skipped = summary.skipped,
        "snapshot created"
    );
    Ok(SyncOutcome { folder, summary })
}
