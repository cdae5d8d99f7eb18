//! Error types for the synchronization engine.
//!
//! The primary error type is `EngineError`. Configuration-time errors leave
//! the engine invalid; cycle-level errors abort a single cycle only. Per-file
//! read failures during hashing are folded into a zero digest and never reach
//! the caller as an `EngineError`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the engine, its cycles, and its worker lifecycle.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source directory does not exist
    #[error("Source directory not found: {}", .path.display())]
    SourceNotFound { path: PathBuf },

    /// Source path exists but is not a directory
    #[error("Source is not a directory: {}", .path.display())]
    SourceNotDirectory { path: PathBuf },

    /// Destination root could not be created at construction time
    #[error("Destination directory unavailable: {}", .path.display())]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Source directory disappeared while the engine was running
    #[error("Source directory vanished: {}", .path.display())]
    SourceVanished { path: PathBuf },

    /// Failed to read from a source file
    #[error("Failed to read file: {}", .path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write to a destination file
    #[error("Failed to write file: {}", .path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to enumerate a directory
    #[error("Failed to enumerate directory: {}", .path.display())]
    EnumerationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create a directory
    #[error("Failed to create directory: {}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The timestamped snapshot folder of a cycle could not be created
    #[error("Failed to create snapshot folder: {}", .path.display())]
    SnapshotFolderCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Operation attempted on an engine that has been marked invalid
    #[error("Engine is not valid")]
    InvalidEngine,

    /// `start` called while a worker is running or still stopping
    #[error("Monitor worker is already running")]
    WorkerAlreadyRunning,

    /// `stop` called while no worker is running
    #[error("Monitor worker is not running")]
    WorkerNotRunning,

    /// The monitor thread could not be spawned
    #[error("Failed to spawn monitor worker")]
    WorkerSpawn {
        #[source]
        source: io::Error,
    },

    /// The monitor thread panicked before acknowledging the stop
    #[error("Monitor worker panicked")]
    WorkerPanicked,

    /// Hashing pool could not be built
    #[error("Failed to build hashing pool: {message}")]
    WorkerPool { message: String },

    /// Configuration file could not be read or parsed
    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<u32> {
        match self {
            Self::DestinationUnavailable { source, .. }
            | Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::EnumerationFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. }
            | Self::SnapshotFolderCreation { source, .. } => {
                source.raw_os_error().map(|e| e as u32)
            }
            _ => None,
        }
    }

    /// Returns true if this error leaves the engine unable to run further cycles.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. }
                | Self::SourceNotDirectory { .. }
                | Self::DestinationUnavailable { .. }
                | Self::SourceVanished { .. }
                | Self::InvalidEngine
                | Self::WorkerPool { .. }
        )
    }
}
