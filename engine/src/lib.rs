//! # snapsync Engine - Interval Snapshot Library
//!
//! A headless engine that watches one directory and, whenever its content
//! changes, copies it into a new timestamped snapshot folder.
//! Designed as the foundation for multiple front ends (CLI, service, automation).
//!
//! ## Overview
//!
//! Every interval the engine runs one cycle:
//! - Scan the source into the files to fingerprint and the entries to copy
//! - Fingerprint every file in parallel on a fixed-width pool
//! - Compare against the previous cycle's fingerprints
//! - On any difference, copy the allowed fileset into `<dest>/<name> <timestamp>`
//! - Report the outcome through a progress callback, gated by verbosity
//!
//! ## Basic Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use engine::{SyncConfig, Synchronizer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::new("/srv/data", None)
//!     .with_subfolders(true)
//!     .exclude("cache")
//!     .with_interval(Duration::from_secs(60));
//!
//! let mut engine = Synchronizer::new(config);
//! if let Some(e) = engine.construction_error() {
//!     return Err(e.to_string().into());
//! }
//!
//! // One cycle right now
//! let report = engine.run_cycle()?;
//! println!("{} files updated", report.files_updated());
//!
//! // Or keep watching in the background
//! engine.start()?;
//! std::thread::sleep(Duration::from_secs(600));
//! engine.stop()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **config**: Engine configuration and its defaults
//! - **model**: Core data structures (fingerprints, cycle reports, worker state)
//! - **error**: Error types and handling
//! - **fs_ops**: Low-level filesystem operations
//! - **checksums**: 64-bit file digests
//! - **scanner**, **detector**, **sync**: The three stages of a cycle
//! - **synchronizer**: Engine surface and monitor worker lifecycle
//! - **progress**: Progress callback trait

pub mod checksums;
pub mod clock;
pub mod config;
pub mod detector;
pub mod error;
pub mod fs_ops;
pub mod model;
pub mod pool;
pub mod progress;
pub mod scanner;
pub mod snapshot;
pub mod sync;
pub mod synchronizer;

// Re-export main types
pub use checksums::DigestAlgorithm;
pub use config::{SubfolderDepth, SyncConfig, Verbosity};
pub use error::EngineError;
pub use model::{
    CycleReport, Detection, DetectionReason, EntryStatus, FileFingerprint, FileListingEntry,
    Snapshot, SyncOutcome, WorkerState,
};
pub use progress::{LogProgress, ProgressCallback};
pub use synchronizer::Synchronizer;
