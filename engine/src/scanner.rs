//! Directory scanning.
//!
//! Splits the monitored root into the files to fingerprint (hash-set) and the
//! entries to copy (copy-set), applying the subfolder rules of the config.

use std::path::PathBuf;

use tracing::debug;

use crate::config::{SubfolderDepth, SyncConfig};
use crate::error::EngineError;
use crate::fs_ops;
use crate::model::CycleTask;

/// Scan the source root of a resolved config.
///
/// Top-level files go to both sets. With subfolders enabled, each immediate
/// subfolder whose base name is not excluded is copied as a whole, and its
/// files (per `SubfolderDepth`) are fingerprinted.
///
/// # Errors
/// `SourceVanished` if the root no longer exists; `EnumerationFailed` if it
/// exists but cannot be listed.
pub fn scan(config: &SyncConfig) -> Result<CycleTask, EngineError> {
    let root = &config.source;
    if !fs_ops::is_dir(root) {
        return Err(EngineError::SourceVanished { path: root.clone() });
    }

    let mut top_files: Vec<PathBuf> = Vec::new();
    let mut top_dirs: Vec<PathBuf> = Vec::new();
    for child in fs_ops::list_dir(root)? {
        if fs_ops::is_file(&child) {
            top_files.push(child);
        } else if fs_ops::is_dir(&child) {
            top_dirs.push(child);
        }
    }

    let mut task = CycleTask {
        hash_set: top_files.clone(),
        copy_set: top_files,
    };

    if config.include_subfolders {
        for dir in top_dirs {
            if config.is_excluded(&fs_ops::base_name(&dir)) {
                debug!(path = %dir.display(), "subfolder excluded");
                continue;
            }
            let files = match config.subfolder_depth {
                SubfolderDepth::Recursive => fs_ops::list_files_recursive(&dir),
                SubfolderDepth::Shallow => fs_ops::list_files_shallow(&dir),
            };
            task.hash_set.extend(files);
            task.copy_set.push(dir);
        }
    }

    task.hash_set.sort();
    task.copy_set.sort();
    debug!(
        hash_set = task.hash_set.len(),
        copy_set = task.copy_set.len(),
        "scan complete"
    );
    Ok(task)
}
