//! snapsync - Command-line front end for the snapshot engine.
//!
//! Watches a directory and writes a timestamped snapshot of it whenever its
//! content changes. Type `stop` on stdin to end the service.

use chrono::Local;
use clap::Parser;
use engine::{
    CycleReport, DetectionReason, DigestAlgorithm, EngineError, EntryStatus, FileListingEntry,
    ProgressCallback, SubfolderDepth, SyncConfig, Synchronizer,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const EXIT_OK: i32 = 0;
const EXIT_PRECONDITION: i32 = 1;
const EXIT_START_FAILED: i32 = 2;
const EXIT_STOP_FAILED: i32 = 3;

/// snapsync - interval-based snapshot backups
#[derive(Parser, Debug)]
#[command(name = "snapsync")]
#[command(version = "0.1.0")]
#[command(about = "Copy a directory into a timestamped snapshot whenever it changes")]
struct Args {
    /// Directory to monitor
    #[arg(value_name = "SRC")]
    src: Option<PathBuf>,

    /// Destination root; `$` or omitted selects `<parent of SRC>/snapsync`
    #[arg(value_name = "DST")]
    dst: Option<PathBuf>,

    /// Include immediate subfolders of the source
    #[arg(long)]
    subfolders: bool,

    /// Immediate subfolder name to leave out (repeatable)
    #[arg(long, value_name = "NAME")]
    exclude: Vec<String>,

    /// Only fingerprint files directly inside each subfolder
    #[arg(long)]
    shallow: bool,

    /// Polling interval in milliseconds (0 selects the default of 5 minutes)
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,

    /// 0 = silent, 1 = summary, 2 = per-file listing
    #[arg(long, value_name = "N")]
    verbosity: Option<u8>,

    /// Hashing threads (0 or more than available selects all cores)
    #[arg(long, value_name = "N")]
    cores: Option<usize>,

    /// Digest algorithm: crc64, md5, sha256, blake3
    #[arg(long, value_name = "ALGORITHM")]
    algorithm: Option<String>,

    /// TOML configuration file; command-line values override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run a single cycle immediately and exit
    #[arg(long)]
    once: bool,

    /// Refuse to run without administrative privileges
    #[arg(long)]
    require_elevated: bool,
}

/// Console sink for engine events
struct CliProgress;

impl CliProgress {
    fn stamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

impl ProgressCallback for CliProgress {
    fn on_monitor_started(&self, config: &SyncConfig) {
        eprintln!("[{}] Monitoring {}", Self::stamp(), config.source.display());
        eprintln!("  Snapshots: {}", config.destination().display());
        eprintln!("  Interval: {}s", config.interval().as_secs());
    }

    fn on_cycle_started(&self, _cycle_id: Uuid) {}

    fn on_cycle_completed(&self, report: &CycleReport) {
        match &report.sync {
            Some(outcome) => {
                eprintln!(
                    "[{}] New snapshot, {} files updated: {}",
                    Self::stamp(),
                    report.files_updated(),
                    outcome.folder.display()
                );
                if outcome.summary.skipped > 0 {
                    eprintln!("  {} entries could not be copied", outcome.summary.skipped);
                }
            }
            None => eprintln!("[{}] No change", Self::stamp()),
        }
        if let DetectionReason::FileCountChanged { previous, current } = report.detection.reason {
            eprintln!("  File count {} -> {}", previous, current);
        }
    }

    fn on_cycle_failed(&self, _cycle_id: Uuid, error: &EngineError) {
        eprintln!("[{}] Error: {}", Self::stamp(), error);
    }

    fn on_file_listing(&self, entries: &[FileListingEntry]) {
        for entry in entries {
            match entry.status {
                EntryStatus::Unchanged => eprintln!("  existing file {}", entry.path.display()),
                EntryStatus::New | EntryStatus::Modified => eprintln!(
                    "  updated file {} current hash {:016x}",
                    entry.path.display(),
                    entry.digest
                ),
            }
        }
    }

    fn on_monitor_stopped(&self, config: &SyncConfig) {
        eprintln!("[{}] Stopped monitoring {}", Self::stamp(), config.source.display());
    }
}

/// Failure of a CLI run with its process exit code
#[derive(Debug)]
struct CliError {
    code: i32,
    message: String,
}

impl CliError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        CliError {
            code,
            message: message.into(),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let exit_code = match run_cli(&args, std::io::stdin().lock()) {
        Ok(()) => EXIT_OK,
        Err(e) => {
            eprintln!("Error: {}", e.message);
            e.code
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli<R: BufRead>(args: &Args, input: R) -> Result<(), CliError> {
    if args.require_elevated {
        eprintln!("Process id: {}", std::process::id());
        if !is_elevated() {
            return Err(CliError::new(
                EXIT_PRECONDITION,
                "administrative privileges are required (--require-elevated)",
            ));
        }
    }

    let config = build_config(args).map_err(|msg| CliError::new(EXIT_PRECONDITION, msg))?;
    debug!(?config, "configuration built");
    let mut engine = Synchronizer::with_progress(config, Arc::new(CliProgress));
    if let Some(e) = engine.construction_error() {
        return Err(CliError::new(EXIT_START_FAILED, e.to_string()));
    }

    if args.once {
        return engine
            .run_cycle()
            .map(|_| ())
            .map_err(|e| CliError::new(EXIT_START_FAILED, e.to_string()));
    }

    engine
        .start()
        .map_err(|e| CliError::new(EXIT_START_FAILED, format!("Failed to start: {}", e)))?;
    eprintln!("Type 'stop' to end the service.");

    wait_for_stop(input);

    engine
        .stop()
        .map_err(|e| CliError::new(EXIT_STOP_FAILED, format!("Failed to stop: {}", e)))
}

/// Block until a `stop` line arrives or the input closes.
fn wait_for_stop<R: BufRead>(input: R) {
    for line in input.lines() {
        match line {
            Ok(line) if line.trim().eq_ignore_ascii_case("stop") => return,
            Ok(_) => eprintln!("Type 'stop' to end the service."),
            Err(_) => return,
        }
    }
}

/// Merge the optional config file with command-line values.
fn build_config(args: &Args) -> Result<SyncConfig, String> {
    let mut config = match &args.config {
        Some(path) => SyncConfig::load(path).map_err(|e| e.to_string())?,
        None => SyncConfig::default(),
    };

    if let Some(src) = &args.src {
        config.source = src.clone();
    }
    if config.source.as_os_str().is_empty() {
        return Err("No source directory given".to_string());
    }
    if args.dst.is_some() {
        config.destination = args.dst.clone();
    }

    if args.subfolders {
        config.include_subfolders = true;
    }
    config
        .excluded_subfolders
        .extend(args.exclude.iter().cloned());
    if args.shallow {
        config.subfolder_depth = SubfolderDepth::Shallow;
    }

    if let Some(ms) = args.interval {
        config = config.with_interval(Duration::from_millis(ms));
    }
    if let Some(level) = args.verbosity {
        config = config.with_verbosity(level);
    }
    if let Some(cores) = args.cores {
        config = config.with_hash_workers(cores);
    }
    if let Some(name) = &args.algorithm {
        let algorithm = DigestAlgorithm::from_str(name).ok_or_else(|| {
            format!(
                "Invalid algorithm '{}'. Must be 'crc64', 'md5', 'sha256', or 'blake3'",
                name
            )
        })?;
        config = config.with_algorithm(algorithm);
    }

    Ok(config)
}

#[cfg(unix)]
fn is_elevated() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_elevated() -> bool {
    false
}
