//! # Engine - LSM coordinator
//!
//! Ties the [`memtable`], [`run`] and [`compaction`] crates together into a
//! key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                  LsmEngine                    │
//! │                                               │
//! │ write.rs → Memtable insert                    │
//! │              |                                │
//! │              |  (memtable full?)              │
//! │              |            yes                 │
//! │              v                                │
//! │           flush() → new level-0 run           │
//! │              |                                │
//! │              |  (strategy: compact?)          │
//! │              |            yes                 │
//! │              v                                │
//! │           worker.submit(run names)  ───────── │ ──► lsm-compaction thread
//! │                                               │
//! │ read.rs → Memtable → runs, newest first       │
//! │            (first match wins)                 │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                                  |
//! |----------------|----------------------------------------------------------|
//! | [`lib.rs`]     | `LsmEngine` struct, `open`, accessors, `close`, `Drop`   |
//! | [`write`]      | `put()`, `delete()`, `flush()`                           |
//! | [`read`]       | `get()`, `scan()`, `scan_prefix()`                       |
//! | [`compaction`] | `compact()`, `needs_compaction()`, `compaction_plan()`   |
//! | [`metrics`]    | per-operation counters and uptime                        |
//! | [`stats`]      | `EngineStats`                                            |
//!
//! ## Concurrency
//!
//! Foreground calls take `&mut self` (writes) or `&self` (reads), so one
//! caller drives the engine at a time. The only other thread is the
//! compaction worker. It touches nothing but the [`RunRegistry`], which swaps
//! compaction outputs in and inputs out under a single lock; a read works on
//! a snapshot taken when it starts.
//!
//! ## Durability
//!
//! Writes live only in the memtable until the next flush. Run files are
//! written to a temp file and renamed into place, so a crash never leaves a
//! half-written run behind, but unflushed writes are lost.
mod compaction;
mod metrics;
mod read;
mod stats;
mod write;

use std::path::Path;
use std::sync::Arc;

use ::compaction::{CompactionStrategy, CompactionWorker};
use anyhow::{Context, Result};
use config::EngineConfig;
use memtable::Memtable;
use run::RunRegistry;

use crate::metrics::OpMetrics;
use tracing::{error, info};

pub use ::compaction::{CompactionKind, CompactionTask, WorkerStatus};
pub use config::{CompactionConfig, MemtableVariant};
pub use memtable::Entry;
pub use metrics::OpCounts;
pub use stats::EngineStats;

/// The LSM storage engine.
///
/// # Write Path
///
/// 1. Insert into the active memtable.
/// 2. If the memtable reports it is full, flush it to a new level-0 run.
/// 3. After a flush, ask the strategy whether compaction is warranted and,
///    when the background worker runs, hand it the current run list.
///
/// # Read Path
///
/// 1. Check the memtable (freshest data, includes tombstones).
/// 2. Check runs from newest to oldest.
/// 3. First match wins; tombstones shadow older values.
///
/// # Recovery
///
/// [`LsmEngine::open`] registers every run file found in the data
/// directory. There is no write-ahead log.
pub struct LsmEngine {
    pub(crate) config: EngineConfig,
    pub(crate) memtable: Box<dyn Memtable>,
    pub(crate) registry: Arc<RunRegistry>,
    pub(crate) worker: CompactionWorker,
    pub(crate) metrics: OpMetrics,
    closed: bool,
}

impl std::fmt::Debug for LsmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LsmEngine")
            .field("data_dir", &self.config.data_dir)
            .field("memtable_variant", &self.memtable.variant())
            .field("memtable_bytes", &self.memtable.size_bytes())
            .field("memtable_entries", &self.memtable.entry_count())
            .field("max_memtable_size_bytes", &self.config.max_memtable_size_bytes)
            .field("run_count", &self.registry.len())
            .field("background_compaction", &self.worker.is_running())
            .finish()
    }
}

impl LsmEngine {
    /// Opens an engine over `config.data_dir`.
    ///
    /// # Steps
    ///
    /// 1. Validate the configuration.
    /// 2. Create the data directory if needed, delete leftover `*.dat.tmp`
    ///    files, and register every `run_L<level>_<seq>.dat` found.
    /// 3. Build an empty memtable of the configured variant.
    /// 4. Build the compaction strategy and worker; start the worker when
    ///    background compaction is enabled.
    ///
    /// # Errors
    ///
    /// A [`config::ConfigError`] for an invalid configuration, or an I/O or
    /// corruption error from opening existing runs.
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(
            RunRegistry::open(&config.data_dir)
                .with_context(|| format!("opening data dir {}", config.data_dir.display()))?,
        );
        let memtable = memtable::create(config.memtable_variant, config.max_memtable_size_bytes);
        let strategy = Arc::new(CompactionStrategy::new(
            config.compaction.clone(),
            Arc::clone(&registry),
        ));
        let worker = CompactionWorker::new(strategy, config.compaction_check_interval);
        if config.enable_background_compaction {
            worker.start()?;
        }

        info!(
            dir = %config.data_dir.display(),
            memtable = %config.memtable_variant,
            runs = registry.len(),
            background = config.enable_background_compaction,
            "engine opened"
        );

        Ok(Self {
            config,
            memtable,
            registry,
            worker,
            metrics: OpMetrics::new(),
            closed: false,
        })
    }

    /// Opens an engine over `data_dir` with default settings.
    pub fn open_default<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Self::open(
            EngineConfig::builder()
                .data_dir(data_dir.as_ref())
                .build(),
        )
    }

    /// Stops the compaction worker and flushes whatever the memtable still
    /// holds.
    ///
    /// A compaction in progress finishes first. If the final flush fails
    /// the error is returned and the unflushed writes are gone.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.worker.stop();
        if !self.memtable.is_empty() {
            self.flush_memtable()?;
        }
        info!(dir = %self.config.data_dir.display(), runs = self.registry.len(), "engine closed");
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// The active memtable.
    #[must_use]
    pub fn memtable(&self) -> &dyn Memtable {
        self.memtable.as_ref()
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn strategy(&self) -> &Arc<CompactionStrategy> {
        self.worker.strategy()
    }

    #[must_use]
    pub fn worker(&self) -> &CompactionWorker {
        &self.worker
    }

    /// Number of registered runs across all levels.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of registered runs at `level`.
    #[must_use]
    pub fn level_run_count(&self, level: usize) -> usize {
        self.registry
            .snapshot()
            .iter()
            .filter(|r| r.level() == level)
            .count()
    }
}

impl Drop for LsmEngine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %format!("{:#}", e), "final flush failed, unflushed writes lost");
        }
    }
}

#[cfg(test)]
mod tests;
