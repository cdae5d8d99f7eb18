//! Engine configuration.
//!
//! A `SyncConfig` is built once (from code, a TOML file, or the CLI) and
//! handed to the `Synchronizer`, which keeps only the `resolved()` copy and
//! never changes it afterwards.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::checksums::DigestAlgorithm;
use crate::error::EngineError;
use crate::fs_ops;

/// Default polling interval: five minutes.
pub const DEFAULT_INTERVAL_MS: u64 = 5 * 60 * 1000;

/// Default sleep quantum between interval checks.
pub const DEFAULT_POLL_QUANTUM_MS: u64 = 200;

/// Default hashing concurrency width.
pub const DEFAULT_HASH_WORKERS: usize = 20;

/// Name of the folder created next to the source when no destination is given.
pub const DEFAULT_DESTINATION_DIR: &str = "snapsync";

/// Destination value meaning "use the default destination".
pub const DESTINATION_PLACEHOLDER: &str = "$";

/// How deep the scanner looks inside each allowed subfolder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubfolderDepth {
    /// Fingerprint every file in the subfolder's tree
    #[default]
    Recursive,
    /// Fingerprint only files placed directly inside the subfolder
    Shallow,
}

/// How much the engine reports to its progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// No events
    Silent = 0,
    /// Start, cycle result and stop events
    Summary = 1,
    /// Summary events plus a per-file listing after every cycle
    Detailed = 2,
}

impl Verbosity {
    /// Map a numeric level to a verbosity; anything above 2 is `Detailed`.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Verbosity::Silent,
            1 => Verbosity::Summary,
            _ => Verbosity::Detailed,
        }
    }
}

/// Configuration for one monitored directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory to monitor
    pub source: PathBuf,

    /// Root under which timestamped snapshot folders are created
    pub destination: Option<PathBuf>,

    /// Whether immediate subfolders of the source are monitored and copied
    pub include_subfolders: bool,

    /// Base names of immediate subfolders to leave out
    pub excluded_subfolders: BTreeSet<String>,

    /// How far below each allowed subfolder files are fingerprinted
    pub subfolder_depth: SubfolderDepth,

    /// Polling interval in milliseconds
    pub interval_ms: u64,

    /// Sleep quantum between interval checks, in milliseconds
    pub poll_quantum_ms: u64,

    /// Reporting level, 0 to 2
    pub verbosity: u8,

    /// Number of threads used for fingerprinting
    pub hash_workers: usize,

    /// Digest used for file fingerprints
    pub algorithm: DigestAlgorithm,

    /// Set by `resolved`; the destination is fixed from then on
    #[serde(skip)]
    resolved: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            source: PathBuf::new(),
            destination: None,
            include_subfolders: false,
            excluded_subfolders: BTreeSet::new(),
            subfolder_depth: SubfolderDepth::default(),
            interval_ms: DEFAULT_INTERVAL_MS,
            poll_quantum_ms: DEFAULT_POLL_QUANTUM_MS,
            verbosity: Verbosity::Detailed as u8,
            hash_workers: DEFAULT_HASH_WORKERS,
            algorithm: DigestAlgorithm::default(),
            resolved: false,
        }
    }
}

impl SyncConfig {
    /// Create a configuration with default settings for the given paths.
    pub fn new<S: AsRef<Path>>(source: S, destination: Option<PathBuf>) -> Self {
        SyncConfig {
            source: source.as_ref().to_path_buf(),
            destination,
            ..SyncConfig::default()
        }
    }

    pub fn with_subfolders(mut self, include: bool) -> Self {
        self.include_subfolders = include;
        self
    }

    /// Exclude an immediate subfolder by its base name.
    pub fn exclude<N: Into<String>>(mut self, name: N) -> Self {
        self.excluded_subfolders.insert(name.into());
        self
    }

    pub fn with_depth(mut self, depth: SubfolderDepth) -> Self {
        self.subfolder_depth = depth;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = millis(interval);
        self
    }

    pub fn with_poll_quantum(mut self, quantum: Duration) -> Self {
        self.poll_quantum_ms = millis(quantum);
        self
    }

    pub fn with_verbosity(mut self, level: u8) -> Self {
        self.verbosity = level;
        self
    }

    pub fn with_hash_workers(mut self, workers: usize) -> Self {
        self.hash_workers = workers;
        self
    }

    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        toml::from_str(text).map_err(|e| EngineError::Config {
            message: e.to_string(),
        })
    }

    /// Load a configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&text)
    }

    /// Polling interval as a `Duration`; zero falls back to the default.
    pub fn interval(&self) -> Duration {
        if self.interval_ms == 0 {
            Duration::from_millis(DEFAULT_INTERVAL_MS)
        } else {
            Duration::from_millis(self.interval_ms)
        }
    }

    /// Sleep quantum as a `Duration`; zero falls back to the default.
    pub fn poll_quantum(&self) -> Duration {
        if self.poll_quantum_ms == 0 {
            Duration::from_millis(DEFAULT_POLL_QUANTUM_MS)
        } else {
            Duration::from_millis(self.poll_quantum_ms)
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_level(self.verbosity)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_subfolders.contains(name)
    }

    /// Destination root, or the default derived from the source when unset.
    ///
    /// An empty path, the `$` placeholder, and a path naming an existing
    /// non-directory all select `<parent of source>/snapsync`.
    pub fn destination_root(&self) -> PathBuf {
        let source = fs_ops::absolute_path(&self.source);
        match &self.destination {
            Some(dest)
                if !dest.as_os_str().is_empty()
                    && dest.as_os_str() != DESTINATION_PLACEHOLDER
                    && !(dest.exists() && !dest.is_dir()) =>
            {
                fs_ops::absolute_path(dest)
            }
            _ => default_destination(&source),
        }
    }

    /// Snapshot root of a resolved config, fixed at resolution time.
    ///
    /// Unlike `destination_root` this does not look at the filesystem again,
    /// so a destination that later turns into a file is not replaced by the
    /// default. On an unresolved config it equals `destination_root`.
    pub fn destination(&self) -> PathBuf {
        match &self.destination {
            Some(dest) if self.resolved => dest.clone(),
            _ => self.destination_root(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Return a copy with absolute paths, the destination resolved, and
    /// numeric settings clamped to their valid ranges.
    pub fn resolved(&self) -> SyncConfig {
        SyncConfig {
            source: fs_ops::absolute_path(&self.source),
            destination: Some(self.destination()),
            include_subfolders: self.include_subfolders,
            excluded_subfolders: self.excluded_subfolders.clone(),
            subfolder_depth: self.subfolder_depth,
            interval_ms: millis(self.interval()),
            poll_quantum_ms: millis(self.poll_quantum()),
            verbosity: self.verbosity() as u8,
            hash_workers: clamp_workers(self.hash_workers),
            algorithm: self.algorithm,
            resolved: true,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn default_destination(source: &Path) -> PathBuf {
    source
        .parent()
        .unwrap_or(source)
        .join(DEFAULT_DESTINATION_DIR)
}

/// Clamp a worker count to `1..=available_parallelism`; zero selects the maximum.
pub fn clamp_workers(requested: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if requested == 0 || requested > available {
        available
    } else {
        requested
    }
}
