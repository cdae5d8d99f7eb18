//! Engine surface and monitor worker lifecycle.
//!
//! A `Synchronizer` owns one resolved configuration, the snapshot store and
//! the hashing pool. Cycles run either on demand (`run_cycle`) or from a
//! background worker started with `start` and stopped with `stop`:
//!
//! ```text
//! Idle --start--> Running --stop--> StopRequested --join--> Stopped --start--> Running
//! ```
//!
//! A stop request is observed between cycles; a cycle in progress always
//! runs to completion first.

use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Stopwatch;
use crate::config::{SyncConfig, Verbosity};
use crate::detector;
use crate::error::EngineError;
use crate::fs_ops;
use crate::model::{CycleReport, Snapshot, WorkerState};
use crate::pool::HashPool;
use crate::progress::{LogProgress, ProgressCallback};
use crate::scanner;
use crate::snapshot::SnapshotStore;
use crate::sync;

/// State shared between the `Synchronizer` and its worker thread.
struct Core {
    config: SyncConfig,
    store: SnapshotStore,
    pool: Option<HashPool>,
    valid: AtomicBool,
    /// Held for the duration of a cycle so cycles never overlap
    cycle_lock: Mutex<()>,
    progress: Arc<dyn ProgressCallback>,
}

impl Core {
    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn verbosity(&self) -> Verbosity {
        self.config.verbosity()
    }

    fn run_cycle(&self) -> Result<CycleReport, EngineError> {
        let cycle_id = Uuid::new_v4();
        let verbosity = self.verbosity();
        if verbosity >= Verbosity::Summary {
            self.progress.on_cycle_started(cycle_id);
        }

        let (result, listing) = {
            let _cycle = self.cycle_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let result = self.execute_cycle(cycle_id);
            // read under the cycle lock: *current* is complete here
            let listing = (verbosity >= Verbosity::Detailed).then(|| self.store.listing());
            (result, listing)
        };

        match &result {
            Ok(report) => {
                if verbosity >= Verbosity::Summary {
                    self.progress.on_cycle_completed(report);
                }
            }
            Err(e) => {
                debug!(%cycle_id, error = %e, "cycle failed");
                if verbosity >= Verbosity::Summary {
                    self.progress.on_cycle_failed(cycle_id, e);
                }
            }
        }
        if let Some(entries) = listing {
            self.progress.on_file_listing(&entries);
        }
        result
    }

    /// One cycle; the caller holds `cycle_lock`.
    fn execute_cycle(&self, cycle_id: Uuid) -> Result<CycleReport, EngineError> {
        if !self.is_valid() {
            return Err(EngineError::InvalidEngine);
        }
        let pool = self.pool.as_ref().ok_or(EngineError::InvalidEngine)?;

        let started_at = Local::now();
        let task = match scanner::scan(&self.config) {
            Ok(task) => task,
            Err(e) => {
                if e.is_fatal() {
                    warn!(error = %e, "engine marked invalid");
                    self.valid.store(false, Ordering::SeqCst);
                }
                return Err(e);
            }
        };

        let detection = detector::detect(&task, &self.store, pool, self.config.algorithm);
        let sync = if detection.sync_needed {
            Some(sync::execute(&self.config, &task)?)
        } else {
            None
        };

        Ok(CycleReport {
            id: cycle_id,
            started_at,
            finished_at: Local::now(),
            detection,
            sync,
        })
    }
}

struct WorkerHandle {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

/// Interval-based snapshot engine for one monitored directory.
pub struct Synchronizer {
    core: Arc<Core>,
    construction_error: Option<EngineError>,
    state: WorkerState,
    worker: Option<WorkerHandle>,
}

impl Synchronizer {
    /// Construct an engine that reports through `tracing`.
    ///
    /// Always returns an instance; check `is_valid` before use.
    pub fn new(config: SyncConfig) -> Self {
        Self::with_progress(config, Arc::new(LogProgress))
    }

    /// Construct an engine that reports to the given progress callback.
    pub fn with_progress(config: SyncConfig, progress: Arc<dyn ProgressCallback>) -> Self {
        let config = config.resolved();
        let (pool, construction_error) =
            match validate(&config).and_then(|()| HashPool::new(config.hash_workers)) {
                Ok(pool) => (Some(pool), None),
                Err(e) => {
                    warn!(error = %e, "invalid engine configuration");
                    (None, Some(e))
                }
            };

        debug!(
            source = %config.source.display(),
            destination = ?config.destination,
            valid = construction_error.is_none(),
            "engine constructed"
        );

        Synchronizer {
            core: Arc::new(Core {
                valid: AtomicBool::new(construction_error.is_none()),
                config,
                store: SnapshotStore::new(),
                pool,
                cycle_lock: Mutex::new(()),
                progress,
            }),
            construction_error,
            state: WorkerState::Idle,
            worker: None,
        }
    }

    /// Returns false if construction failed or the source has vanished.
    pub fn is_valid(&self) -> bool {
        self.core.is_valid()
    }

    /// Why construction failed, if it did.
    pub fn construction_error(&self) -> Option<&EngineError> {
        self.construction_error.as_ref()
    }

    /// The resolved configuration in use.
    pub fn config(&self) -> &SyncConfig {
        &self.core.config
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Digests recorded by the most recent cycle.
    pub fn last_snapshot(&self) -> Snapshot {
        self.core.store.last()
    }

    /// Run one scan, hash, detect and (if needed) sync pass right now.
    ///
    /// Waits for a cycle already running on the worker to finish first.
    pub fn run_cycle(&self) -> Result<CycleReport, EngineError> {
        self.core.run_cycle()
    }

    /// Start the background monitor worker.
    ///
    /// # Errors
    /// `InvalidEngine` if the engine is invalid, `WorkerAlreadyRunning` if a
    /// worker exists.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if !self.is_valid() {
            return Err(EngineError::InvalidEngine);
        }
        if self.worker.is_some() || !self.state.can_start() {
            return Err(EngineError::WorkerAlreadyRunning);
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let core = Arc::clone(&self.core);
        let thread = thread::Builder::new()
            .name("snapsync-monitor".to_string())
            .spawn(move || monitor_loop(core, stop_rx))
            .map_err(|e| EngineError::WorkerSpawn { source: e })?;

        self.worker = Some(WorkerHandle { stop_tx, thread });
        self.state = WorkerState::Running;
        info!(source = %self.core.config.source.display(), "monitor worker started");
        Ok(())
    }

    /// Stop the background worker and wait for it to exit.
    ///
    /// # Errors
    /// `WorkerNotRunning` unless the worker is running; `WorkerPanicked` if
    /// the thread panicked (the worker is released either way).
    pub fn stop(&mut self) -> Result<(), EngineError> {
        if !self.state.can_stop() {
            return Err(EngineError::WorkerNotRunning);
        }
        let handle = self.worker.take().ok_or(EngineError::WorkerNotRunning)?;

        self.state = WorkerState::StopRequested;
        // The receiver only disappears if the thread already exited.
        let _ = handle.stop_tx.send(());
        let joined = handle.thread.join();
        self.state = WorkerState::Stopped;
        info!(source = %self.core.config.source.display(), "monitor worker stopped");

        joined.map_err(|_| EngineError::WorkerPanicked)
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        if self.state.can_stop() {
            let _ = self.stop();
        }
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("source", &self.core.config.source)
            .field("valid", &self.is_valid())
            .field("state", &self.state)
            .finish()
    }
}

/// Check that the source is a directory and the destination root exists or can be created.
fn validate(config: &SyncConfig) -> Result<(), EngineError> {
    match fs::metadata(&config.source) {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => {
            return Err(EngineError::SourceNotDirectory {
                path: config.source.clone(),
            })
        }
        Err(_) => {
            return Err(EngineError::SourceNotFound {
                path: config.source.clone(),
            })
        }
    }

    let destination = config.destination();
    fs_ops::ensure_dir(&destination).map_err(|e| EngineError::DestinationUnavailable {
        path: destination.clone(),
        source: match e {
            EngineError::DirectoryCreationFailed { source, .. } => source,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        },
    })
}

/// Body of the worker thread: one cycle per elapsed interval until stopped.
fn monitor_loop(core: Arc<Core>, stop_rx: Receiver<()>) {
    let interval = core.config.interval();
    let quantum = core.config.poll_quantum();
    let announce = core.verbosity() >= Verbosity::Summary;

    let mut stopwatch = Stopwatch::started();
    if announce {
        core.progress.on_monitor_started(&core.config);
    }

    loop {
        if stopwatch.elapsed() > interval {
            stopwatch.start();
            // Errors were already reported to the progress callback.
            let _ = core.run_cycle();
        }

        match stop_rx.recv_timeout(quantum) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    stopwatch.end();
    debug!(uptime_secs = stopwatch.elapsed_secs(), "monitor loop exited");
    if announce {
        core.progress.on_monitor_stopped(&core.config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DetectionReason, EntryStatus, FileListingEntry};
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};

    // Test helper: records every callback invocation
    #[derive(Default)]
    struct TestProgressCallback {
        calls: Mutex<Vec<String>>,
    }

    impl TestProgressCallback {
        fn get_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.get_calls().iter().filter(|c| c.starts_with(prefix)).count()
        }
    }

    impl ProgressCallback for TestProgressCallback {
        fn on_monitor_started(&self, _config: &SyncConfig) {
            self.calls.lock().unwrap().push("on_monitor_started".to_string());
        }

        fn on_cycle_started(&self, _cycle_id: Uuid) {
            self.calls.lock().unwrap().push("on_cycle_started".to_string());
        }

        fn on_cycle_completed(&self, report: &CycleReport) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("on_cycle_completed({})", report.files_updated()));
        }

        fn on_cycle_failed(&self, _cycle_id: Uuid, error: &EngineError) {
            self.calls.lock().unwrap().push(format!("on_cycle_failed({})", error));
        }

        fn on_file_listing(&self, entries: &[FileListingEntry]) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("on_file_listing({})", entries.len()));
        }

        fn on_monitor_stopped(&self, _config: &SyncConfig) {
            self.calls.lock().unwrap().push("on_monitor_stopped".to_string());
        }
    }

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("data");
        fs::create_dir(&src).expect("Failed to create src dir");
        let dst = temp_dir.path().join("dest");
        (temp_dir, src, dst)
    }

    fn snapshot_folders(dst: &Path) -> Vec<PathBuf> {
        let mut folders: Vec<PathBuf> = fs::read_dir(dst)
            .expect("Failed to list dest")
            .map(|e| e.expect("Failed to read entry").path())
            .collect();
        folders.sort();
        folders
    }

    fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    /// Snapshot folders are named to the second; wait for the next one.
    fn next_second() {
        thread::sleep(Duration::from_millis(1100));
    }

    #[test]
    fn test_construct_creates_destination() {
        let (_temp_dir, src, dst) = setup();
        let engine = Synchronizer::new(SyncConfig::new(&src, Some(dst.clone())));
        assert!(engine.is_valid());
        assert!(engine.construction_error().is_none());
        assert!(dst.is_dir());
        assert_eq!(engine.state(), WorkerState::Idle);
    }

    #[test]
    fn test_invalid_engine_rejects_everything() {
        let (temp_dir, _src, dst) = setup();
        let mut engine = Synchronizer::new(SyncConfig::new(
            temp_dir.path().join("missing"),
            Some(dst),
        ));

        assert!(!engine.is_valid());
        assert!(matches!(
            engine.construction_error(),
            Some(EngineError::SourceNotFound { .. })
        ));
        assert!(matches!(engine.run_cycle(), Err(EngineError::InvalidEngine)));
        assert!(matches!(engine.start(), Err(EngineError::InvalidEngine)));
        assert!(matches!(engine.stop(), Err(EngineError::WorkerNotRunning)));
    }

    #[test]
    fn test_source_that_is_a_file_is_invalid() {
        let (temp_dir, _src, dst) = setup();
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").expect("Failed to write file");
        let engine = Synchronizer::new(SyncConfig::new(&file, Some(dst)));
        assert!(matches!(
            engine.construction_error(),
            Some(EngineError::SourceNotDirectory { .. })
        ));
    }

    #[test]
    fn test_uncreatable_destination_is_invalid() {
        let (temp_dir, src, _dst) = setup();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "x").expect("Failed to write blocker");
        let engine = Synchronizer::new(SyncConfig::new(&src, Some(blocker.join("dest"))));
        assert!(!engine.is_valid());
        assert!(matches!(
            engine.construction_error(),
            Some(EngineError::DestinationUnavailable { .. })
        ));
    }

    #[test]
    fn test_change_scenario_across_cycles() {
        let (_temp_dir, src, dst) = setup();
        fs::write(src.join("a.txt"), "x").expect("Failed to write a");
        let engine = Synchronizer::new(SyncConfig::new(&src, Some(dst.clone())).with_verbosity(0));

        // Cycle 1: first cycle always syncs
        let first = engine.run_cycle().expect("Cycle 1 failed");
        assert_eq!(first.detection.reason, DetectionReason::FirstCycle);
        let folder1 = first.sync.expect("Cycle 1 should sync").folder;
        assert!(fs_ops::base_name(&folder1).starts_with("data "));
        assert_eq!(fs::read_to_string(folder1.join("a.txt")).unwrap(), "x");

        // Cycle 2: nothing changed
        next_second();
        let second = engine.run_cycle().expect("Cycle 2 failed");
        assert!(second.sync.is_none());
        assert_eq!(second.detection.differences, 0);
        assert_eq!(snapshot_folders(&dst).len(), 1);

        // Cycle 3: content changed
        fs::write(src.join("a.txt"), "y").expect("Failed to rewrite a");
        let third = engine.run_cycle().expect("Cycle 3 failed");
        assert_eq!(third.detection.differences, 1);
        assert_eq!(third.files_updated(), 1);
        let folder3 = third.sync.expect("Cycle 3 should sync").folder;
        assert_ne!(folder1, folder3);
        assert_eq!(fs::read_to_string(folder3.join("a.txt")).unwrap(), "y");
        assert_eq!(fs::read_to_string(folder1.join("a.txt")).unwrap(), "x");
        assert_eq!(snapshot_folders(&dst).len(), 2);
    }

    #[test]
    fn test_added_file_creates_new_snapshot() {
        let (_temp_dir, src, dst) = setup();
        fs::write(src.join("a.txt"), "x").expect("Failed to write a");
        let engine = Synchronizer::new(SyncConfig::new(&src, Some(dst.clone())).with_verbosity(0));
        engine.run_cycle().expect("Cycle 1 failed");

        next_second();
        fs::write(src.join("b.txt"), "new").expect("Failed to write b");
        let report = engine.run_cycle().expect("Cycle 2 failed");
        assert!(report.detection.differences >= 1);
        let folder = report.sync.expect("Cycle 2 should sync").folder;
        assert_eq!(fs::read_to_string(folder.join("b.txt")).unwrap(), "new");
        assert_eq!(snapshot_folders(&dst).len(), 2);
    }

    #[test]
    fn test_removed_file_is_absent_from_new_snapshot() {
        let (_temp_dir, src, dst) = setup();
        fs::write(src.join("a.txt"), "x").expect("Failed to write a");
        fs::write(src.join("b.txt"), "y").expect("Failed to write b");
        let engine = Synchronizer::new(SyncConfig::new(&src, Some(dst)).with_verbosity(0));
        engine.run_cycle().expect("Cycle 1 failed");

        next_second();
        fs::remove_file(src.join("b.txt")).expect("Failed to remove b");
        let report = engine.run_cycle().expect("Cycle 2 failed");
        assert!(matches!(
            report.detection.reason,
            DetectionReason::FileCountChanged { previous: 2, current: 1 }
        ));
        let folder = report.sync.expect("Cycle 2 should sync").folder;
        assert!(folder.join("a.txt").exists());
        assert!(!folder.join("b.txt").exists());
    }

    #[test]
    fn test_excluded_subfolder_not_copied_or_hashed() {
        let (_temp_dir, src, dst) = setup();
        fs::write(src.join("a.txt"), "x").expect("Failed to write a");
        fs::create_dir_all(src.join("keep")).expect("Failed to create keep");
        fs::create_dir_all(src.join("skip")).expect("Failed to create skip");
        fs::write(src.join("keep").join("k.txt"), "k").expect("Failed to write k");
        fs::write(src.join("skip").join("s.txt"), "s").expect("Failed to write s");

        let config = SyncConfig::new(&src, Some(dst))
            .with_subfolders(true)
            .exclude("skip")
            .with_verbosity(0);
        let engine = Synchronizer::new(config);
        let report = engine.run_cycle().expect("Cycle failed");

        let folder = report.sync.expect("First cycle should sync").folder;
        assert!(folder.join("keep").join("k.txt").exists());
        assert!(!folder.join("skip").exists());
        let snapshot = engine.last_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.keys().any(|p| p.starts_with(src.join("skip"))));
    }

    #[test]
    fn test_vanished_source_invalidates_engine() {
        let (_temp_dir, src, dst) = setup();
        let engine = Synchronizer::new(SyncConfig::new(&src, Some(dst)).with_verbosity(0));
        engine.run_cycle().expect("Cycle 1 failed");

        fs::remove_dir_all(&src).expect("Failed to remove src");
        assert!(matches!(
            engine.run_cycle(),
            Err(EngineError::SourceVanished { .. })
        ));
        assert!(!engine.is_valid());

        fs::create_dir(&src).expect("Failed to recreate src");
        assert!(matches!(engine.run_cycle(), Err(EngineError::InvalidEngine)));
    }

    #[cfg(unix)]
    #[test]
    fn test_folder_failure_keeps_engine_valid() {
        let (temp_dir, src, dst) = setup();
        fs::write(src.join("a.txt"), "x").expect("Failed to write a");
        let engine = Synchronizer::new(SyncConfig::new(&src, Some(dst.clone())).with_verbosity(0));

        // a dangling symlink as destination root: nothing can be created below it
        fs::remove_dir(&dst).expect("Failed to remove dest");
        std::os::unix::fs::symlink(temp_dir.path().join("nowhere"), &dst)
            .expect("Failed to create symlink");

        let result = engine.run_cycle();
        assert!(matches!(result, Err(EngineError::SnapshotFolderCreation { .. })));
        assert!(engine.is_valid());
    }

    #[test]
    fn test_start_twice_fails_and_stop_releases_worker() {
        let (_temp_dir, src, dst) = setup();
        let config = SyncConfig::new(&src, Some(dst))
            .with_interval(Duration::from_secs(3600))
            .with_poll_quantum(Duration::from_millis(10))
            .with_verbosity(0);
        let mut engine = Synchronizer::new(config);

        assert!(matches!(engine.stop(), Err(EngineError::WorkerNotRunning)));

        engine.start().expect("First start failed");
        assert_eq!(engine.state(), WorkerState::Running);
        assert!(matches!(engine.start(), Err(EngineError::WorkerAlreadyRunning)));
        assert_eq!(engine.state(), WorkerState::Running);

        engine.stop().expect("Stop failed");
        assert_eq!(engine.state(), WorkerState::Stopped);
        assert!(engine.worker.is_none());
        assert!(matches!(engine.stop(), Err(EngineError::WorkerNotRunning)));

        engine.start().expect("Restart failed");
        engine.stop().expect("Second stop failed");
    }

    #[test]
    fn test_stop_interrupts_idle_wait() {
        let (_temp_dir, src, dst) = setup();
        let config = SyncConfig::new(&src, Some(dst))
            .with_interval(Duration::from_secs(3600))
            .with_poll_quantum(Duration::from_secs(30))
            .with_verbosity(0);
        let mut engine = Synchronizer::new(config);
        engine.start().expect("Start failed");
        thread::sleep(Duration::from_millis(50));

        let begin = Instant::now();
        engine.stop().expect("Stop failed");
        assert!(begin.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_worker_runs_cycles_and_reports() {
        let (_temp_dir, src, dst) = setup();
        fs::write(src.join("a.txt"), "x").expect("Failed to write a");
        let progress = Arc::new(TestProgressCallback::default());
        let config = SyncConfig::new(&src, Some(dst.clone()))
            .with_interval(Duration::from_millis(50))
            .with_poll_quantum(Duration::from_millis(10))
            .with_verbosity(2);
        let mut engine = Synchronizer::with_progress(config, progress.clone());

        engine.start().expect("Start failed");
        assert!(wait_for(|| progress.count("on_cycle_completed") >= 2));
        engine.stop().expect("Stop failed");

        let calls = progress.get_calls();
        assert_eq!(calls.first().map(String::as_str), Some("on_monitor_started"));
        assert_eq!(calls.last().map(String::as_str), Some("on_monitor_stopped"));
        assert!(calls.contains(&"on_cycle_completed(1)".to_string()));
        assert!(calls.contains(&"on_cycle_completed(0)".to_string()));
        assert!(progress.count("on_file_listing") >= 2);
        assert_eq!(snapshot_folders(&dst).len(), 1);

        // no further cycles after stop
        let settled = progress.get_calls().len();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(progress.get_calls().len(), settled);
    }

    #[test]
    fn test_summary_verbosity_omits_listing() {
        let (_temp_dir, src, dst) = setup();
        fs::write(src.join("a.txt"), "x").expect("Failed to write a");
        let progress = Arc::new(TestProgressCallback::default());
        let engine = Synchronizer::with_progress(
            SyncConfig::new(&src, Some(dst)).with_verbosity(1),
            progress.clone(),
        );

        engine.run_cycle().expect("Cycle failed");
        assert_eq!(progress.count("on_cycle_started"), 1);
        assert_eq!(progress.count("on_cycle_completed"), 1);
        assert_eq!(progress.count("on_file_listing"), 0);
    }

    #[test]
    fn test_silent_verbosity_reports_nothing() {
        let (_temp_dir, src, dst) = setup();
        let progress = Arc::new(TestProgressCallback::default());
        let mut engine = Synchronizer::with_progress(
            SyncConfig::new(&src, Some(dst))
                .with_interval(Duration::from_millis(20))
                .with_poll_quantum(Duration::from_millis(5))
                .with_verbosity(0),
            progress.clone(),
        );

        engine.start().expect("Start failed");
        thread::sleep(Duration::from_millis(100));
        engine.stop().expect("Stop failed");
        assert!(progress.get_calls().is_empty());
    }

    #[test]
    fn test_failed_cycle_is_reported() {
        let (_temp_dir, src, dst) = setup();
        let progress = Arc::new(TestProgressCallback::default());
        let engine = Synchronizer::with_progress(
            SyncConfig::new(&src, Some(dst)).with_verbosity(1),
            progress.clone(),
        );
        fs::remove_dir(&src).expect("Failed to remove src");

        assert!(engine.run_cycle().is_err());
        assert_eq!(progress.count("on_cycle_failed"), 1);
    }

    #[test]
    fn test_detailed_listing_marks_changes() {
        let (_temp_dir, src, dst) = setup();
        fs::write(src.join("a.txt"), "x").expect("Failed to write a");
        fs::write(src.join("b.txt"), "y").expect("Failed to write b");
        let engine = Synchronizer::new(SyncConfig::new(&src, Some(dst)).with_verbosity(0));
        engine.run_cycle().expect("Cycle 1 failed");

        fs::write(src.join("b.txt"), "changed").expect("Failed to rewrite b");
        engine.run_cycle().expect("Cycle 2 failed");

        let listing = engine.core.store.listing();
        let statuses: Vec<EntryStatus> = listing.iter().map(|e| e.status).collect();
        assert_eq!(statuses, vec![EntryStatus::Unchanged, EntryStatus::Modified]);
    }

    #[test]
    fn test_drop_stops_running_worker() {
        let (_temp_dir, src, dst) = setup();
        let progress = Arc::new(TestProgressCallback::default());
        let mut engine = Synchronizer::with_progress(
            SyncConfig::new(&src, Some(dst))
                .with_interval(Duration::from_secs(3600))
                .with_poll_quantum(Duration::from_millis(10))
                .with_verbosity(1),
            progress.clone(),
        );
        engine.start().expect("Start failed");
        drop(engine);
        assert_eq!(progress.count("on_monitor_stopped"), 1);
    }

    #[test]
    fn test_destination_replaced_by_file_fails_cycle() {
        let (temp_dir, src, dst) = setup();
        fs::write(src.join("a.txt"), "x").expect("Failed to write a");
        let engine = Synchronizer::new(SyncConfig::new(&src, Some(dst.clone())).with_verbosity(0));
        assert!(engine.is_valid());

        fs::remove_dir(&dst).expect("Failed to remove dest");
        fs::write(&dst, "blocker").expect("Failed to write blocker");

        let result = engine.run_cycle();
        assert!(matches!(result, Err(EngineError::SnapshotFolderCreation { .. })));
        assert!(!temp_dir.path().join("snapsync").exists());
        assert!(engine.is_valid());
    }

    #[test]
    fn test_failed_cycle_still_lists_files() {
        let (_temp_dir, src, dst) = setup();
        fs::write(src.join("a.txt"), "x").expect("Failed to write a");
        let progress = Arc::new(TestProgressCallback::default());
        let engine = Synchronizer::with_progress(
            SyncConfig::new(&src, Some(dst.clone())).with_verbosity(2),
            progress.clone(),
        );

        fs::remove_dir(&dst).expect("Failed to remove dest");
        fs::write(&dst, "blocker").expect("Failed to write blocker");

        assert!(engine.run_cycle().is_err());
        assert_eq!(progress.count("on_cycle_failed"), 1);
        assert!(progress.get_calls().contains(&"on_file_listing(1)".to_string()));
    }

    #[test]
    fn test_listing_complete_while_cycles_overlap() {
        const FILES: usize = 200;
        let (_temp_dir, src, dst) = setup();
        for i in 0..FILES {
            fs::write(src.join(format!("f{:03}.txt", i)), format!("{}", i))
                .expect("Failed to write file");
        }
        let progress = Arc::new(TestProgressCallback::default());
        let mut engine = Synchronizer::with_progress(
            SyncConfig::new(&src, Some(dst))
                .with_interval(Duration::from_millis(1))
                .with_poll_quantum(Duration::from_millis(1))
                .with_verbosity(2),
            progress.clone(),
        );

        engine.start().expect("Start failed");
        for _ in 0..50 {
            engine.run_cycle().expect("Cycle failed");
        }
        engine.stop().expect("Stop failed");

        let lengths: Vec<usize> = progress
            .get_calls()
            .iter()
            .filter_map(|c| c.strip_prefix("on_file_listing("))
            .filter_map(|c| c.trim_end_matches(')').parse().ok())
            .collect();
        assert!(lengths.len() >= 50);
        assert!(lengths.iter().all(|&n| n == FILES), "partial listing: {:?}", lengths);
    }
}
