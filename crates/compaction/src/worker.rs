use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use run::RunMetadata;
use tracing::{debug, error, info, warn};

use crate::{CompactionStrategy, CompactionTask, LevelSummary};

enum WorkerMessage {
    Compact(Vec<String>),
    Shutdown,
}

/// Snapshot of what the worker has been doing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStatus {
    pub running: bool,
    /// Jobs accepted by `submit`.
    pub submitted: u64,
    /// Tasks that merged runs, from any path.
    pub completed: u64,
    pub failed: u64,
    /// Jobs dropped because the worker stopped before reaching them.
    pub skipped: u64,
    /// Most recent executed task, with its outputs filled in.
    pub last_task: Option<CompactionTask>,
    pub last_error: Option<String>,
}

struct WorkerShared {
    strategy: Arc<CompactionStrategy>,
    check_interval: Duration,
    running: AtomicBool,
    status: Mutex<WorkerStatus>,
}

impl WorkerShared {
    /// Plans one task over the still-registered subset of `run_files` and
    /// executes it. Shared by the background thread and the blocking path.
    fn run_job(&self, run_files: &[String]) -> Result<Vec<String>> {
        let runs = self.reconcile(run_files);
        let Some(mut task) = self.strategy.plan_compaction(&runs) else {
            debug!(runs = runs.len(), "no compaction needed");
            return Ok(Vec::new());
        };

        match self.strategy.execute_compaction(&task) {
            Ok(outputs) => {
                task.output_files = outputs.clone();
                let mut status = self.status.lock();
                status.completed += 1;
                status.last_task = Some(task);
                Ok(outputs)
            }
            Err(e) => {
                let mut status = self.status.lock();
                status.failed += 1;
                status.last_error = Some(format!("{:#}", e));
                Err(e)
            }
        }
    }

    /// Metadata of the runs in `run_files` that are still registered.
    fn reconcile(&self, run_files: &[String]) -> Vec<RunMetadata> {
        let wanted: HashSet<&str> = run_files.iter().map(String::as_str).collect();
        let runs: Vec<RunMetadata> = self
            .strategy
            .registry()
            .snapshot()
            .iter()
            .filter(|r| wanted.contains(r.file_name()))
            .map(|r| r.metadata().clone())
            .collect();
        if runs.len() < wanted.len() {
            warn!(
                requested = wanted.len(),
                registered = runs.len(),
                "some submitted runs are no longer registered"
            );
        }
        runs
    }

    fn background_loop(&self, rx: channel::Receiver<WorkerMessage>) {
        loop {
            match rx.recv_timeout(self.check_interval) {
                Ok(WorkerMessage::Compact(files)) => {
                    if !self.running.load(Ordering::SeqCst) {
                        self.status.lock().skipped += 1;
                        debug!(runs = files.len(), "worker stopping, job skipped");
                        continue;
                    }
                    if let Err(e) = self.run_job(&files) {
                        error!(error = %format!("{:#}", e), "background compaction failed");
                    }
                }
                Ok(WorkerMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    if !self.running.load(Ordering::SeqCst) {
                        break;
                    }
                    let files = self.strategy.registry().file_names();
                    let summary = LevelSummary::from_file_names(
                        &files,
                        self.strategy.registry(),
                        self.strategy.config().max_levels,
                    );
                    if self.strategy.should_compact(&summary.run_counts, &summary.sizes) {
                        debug!("periodic check found work");
                        if let Err(e) = self.run_job(&files) {
                            error!(error = %format!("{:#}", e), "periodic compaction failed");
                        }
                    }
                }
            }
        }
    }
}

/// Runs compaction on one background thread.
///
/// The thread is fed through a channel. Besides submitted jobs it wakes
/// every `check_interval` and compacts on its own if the strategy says so.
/// [`stop`](CompactionWorker::stop) is cooperative: a merge in progress
/// completes, jobs still queued are dropped.
pub struct CompactionWorker {
    shared: Arc<WorkerShared>,
    sender: Mutex<Option<Sender<WorkerMessage>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CompactionWorker {
    pub fn new(strategy: Arc<CompactionStrategy>, check_interval: Duration) -> Self {
        Self {
            shared: Arc::new(WorkerShared {
                strategy,
                check_interval,
                running: AtomicBool::new(false),
                status: Mutex::new(WorkerStatus::default()),
            }),
            sender: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    /// Spawns the background thread. Starting a running worker does nothing.
    pub fn start(&self) -> Result<()> {
        let mut handle = self.handle.lock();
        if self.shared.running.load(Ordering::SeqCst) {
            info!("compaction worker already running");
            return Ok(());
        }

        let (tx, rx) = channel::unbounded();
        let shared = Arc::clone(&self.shared);
        shared.running.store(true, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name("lsm-compaction".into())
            .spawn(move || shared.background_loop(rx));
        match spawned {
            Ok(h) => {
                *handle = Some(h);
                *self.sender.lock() = Some(tx);
                info!(interval = ?self.shared.check_interval, "compaction worker started");
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(e.into())
            }
        }
    }

    /// Stops the worker and waits for the thread. Safe to call when idle or
    /// already stopped.
    pub fn stop(&self) {
        let mut handle = self.handle.lock();
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self.sender.lock().take() {
            let _ = tx.send(WorkerMessage::Shutdown);
        }
        if let Some(h) = handle.take() {
            if h.join().is_err() {
                error!("compaction thread panicked");
            }
        }
        info!("compaction worker stopped");
    }

    /// Cancels a merge in progress at its next check, then stops.
    pub fn abort(&self) {
        self.shared.strategy.request_cancel();
        self.stop();
        self.shared.strategy.clear_cancel();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Queues a job over `run_files` without blocking. Returns `false`, and
    /// does nothing else, when the worker is not running.
    pub fn submit(&self, run_files: Vec<String>) -> bool {
        if !self.is_running() {
            warn!(runs = run_files.len(), "compaction worker not running, submit ignored");
            return false;
        }
        let sent = match self.sender.lock().as_ref() {
            Some(tx) => tx.send(WorkerMessage::Compact(run_files)).is_ok(),
            None => false,
        };
        if sent {
            self.shared.status.lock().submitted += 1;
        } else {
            warn!("compaction worker channel closed, submit ignored");
        }
        sent
    }

    /// Whether the runs named in `run_files` warrant a compaction. Levels
    /// come from the file names.
    #[must_use]
    pub fn check_compaction_needed(&self, run_files: &[String]) -> bool {
        let strategy = &self.shared.strategy;
        let summary =
            LevelSummary::from_file_names(run_files, strategy.registry(), strategy.config().max_levels);
        strategy.should_compact(&summary.run_counts, &summary.sizes)
    }

    /// The task a job over `run_files` would execute, if any. Its `Display`
    /// is a one-line description.
    #[must_use]
    pub fn get_compaction_plan(&self, run_files: &[String]) -> Option<CompactionTask> {
        let runs = self.shared.reconcile(run_files);
        self.shared.strategy.plan_compaction(&runs)
    }

    /// Runs the same job `submit` would, on the caller's thread.
    pub fn execute_compaction_sync(&self, run_files: &[String]) -> Result<Vec<String>> {
        self.shared.run_job(run_files)
    }

    #[must_use]
    pub fn status(&self) -> WorkerStatus {
        let mut status = self.shared.status.lock().clone();
        status.running = self.is_running();
        status
    }

    #[must_use]
    pub fn strategy(&self) -> &Arc<CompactionStrategy> {
        &self.shared.strategy
    }
}

impl Drop for CompactionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CompactionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactionWorker")
            .field("running", &self.is_running())
            .field("check_interval", &self.shared.check_interval)
            .finish()
    }
}
