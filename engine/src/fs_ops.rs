//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Listing directories (one level or the full tree)
//! - Normalizing paths without touching the filesystem
//! - Copying files and directory trees with metadata preservation
//! - Creating directories recursively

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::EngineError;

/// Totals for one copy operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopySummary {
    /// Files copied successfully
    pub files_copied: usize,
    /// Bytes written across all copied files
    pub bytes_copied: u64,
    /// Files or directories that could not be copied
    pub skipped: usize,
}

impl CopySummary {
    /// Add another summary's counters to this one.
    pub fn absorb(&mut self, other: CopySummary) {
        self.files_copied += other.files_copied;
        self.bytes_copied += other.bytes_copied;
        self.skipped += other.skipped;
    }
}

pub fn is_file(path: &Path) -> bool {
    path.is_file()
}

pub fn is_dir(path: &Path) -> bool {
    path.is_dir()
}

/// Final component of a path, or an empty string for roots.
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Make a path absolute and drop `.` and `..` components.
///
/// The path does not need to exist. Relative paths are resolved against the
/// current directory; if that cannot be read the path is only cleaned.
pub fn absolute_path(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// List the immediate children of a directory as absolute paths.
///
/// # Errors
/// Returns `EnumerationFailed` if the directory cannot be read.
pub fn list_dir(path: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let entries = fs::read_dir(path).map_err(|e| EngineError::EnumerationFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut children = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::EnumerationFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        children.push(absolute_path(&entry.path()));
    }
    children.sort();
    Ok(children)
}

/// List the files placed directly inside a directory.
pub fn list_files_shallow(path: &Path) -> Vec<PathBuf> {
    match list_dir(path) {
        Ok(children) => children.into_iter().filter(|p| p.is_file()).collect(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable directory");
            Vec::new()
        }
    }
}

/// List every file below a directory, descending into all subdirectories.
///
/// Subdirectories that cannot be read are logged and skipped.
pub fn list_files_recursive(path: &Path) -> Vec<PathBuf> {
    fn recurse(path: &Path, files: &mut Vec<PathBuf>) {
        let children = match list_dir(path) {
            Ok(children) => children,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable directory");
                return;
            }
        };

        for child in children {
            if child.is_file() {
                files.push(child);
            } else if child.is_dir() {
                recurse(&child, files);
            }
        }
    }

    let mut files = Vec::new();
    recurse(path, &mut files);
    files
}

/// Create a directory and all of its missing parents.
///
/// # Errors
/// Returns `DirectoryCreationFailed` if the path exists as a file or cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), EngineError> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "Path exists but is not a directory",
            ),
        }),
        Err(_) => fs::create_dir_all(path).map_err(|e| EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Copy a file from source to destination with metadata preservation.
///
/// An existing destination file is overwritten.
///
/// # Returns
/// Number of bytes copied
///
/// # Errors
/// Returns EngineError if the copy fails
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, EngineError> {
    ensure_parent_dir_exists(dst)?;

    let mut src_file = fs::File::open(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    let src_mtime = src_file.metadata().ok().and_then(|m| m.modified().ok());

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            }
        } else {
            EngineError::ReadError {
                path: src.to_path_buf(),
                source: e,
            }
        }
    })?;
    drop(dst_file);

    if let Some(mtime) = src_mtime {
        let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
    }

    Ok(bytes_copied)
}

/// Copy a directory tree, overwriting files that already exist at the target.
///
/// Files that fail to copy are counted in `skipped` and do not stop the copy.
///
/// # Errors
/// Returns EngineError only if the target root cannot be created or the
/// source root cannot be listed.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<CopySummary, EngineError> {
    ensure_dir(dst)?;
    let mut summary = CopySummary::default();

    for child in list_dir(src)? {
        let target = dst.join(base_name(&child));
        if child.is_file() {
            match copy_file_with_metadata(&child, &target) {
                Ok(bytes) => {
                    summary.files_copied += 1;
                    summary.bytes_copied += bytes;
                }
                Err(e) => {
                    debug!(path = %child.display(), error = %e, "file skipped during tree copy");
                    summary.skipped += 1;
                }
            }
        } else if child.is_dir() {
            match copy_tree(&child, &target) {
                Ok(nested) => summary.absorb(nested),
                Err(e) => {
                    debug!(path = %child.display(), error = %e, "directory skipped during tree copy");
                    summary.skipped += 1;
                }
            }
        }
    }

    Ok(summary)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
///
/// # Errors
/// Returns EngineError if directory creation fails
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}
