use std::fmt;
use std::time::Duration;

use ::compaction::{LevelSummary, WorkerStatus};
use config::MemtableVariant;

use crate::{LsmEngine, OpCounts};

/// Point-in-time counters for one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub memtable_variant: MemtableVariant,
    pub memtable_entries: usize,
    pub memtable_bytes: usize,
    /// Runs per level, index 0 is level 0.
    pub level_run_counts: Vec<usize>,
    /// On-disk bytes per level.
    pub level_bytes: Vec<u64>,
    pub run_count: usize,
    pub total_run_bytes: u64,
    /// Entries stored across all runs, shadowed versions and tombstones
    /// included.
    pub total_run_entries: u64,
    /// Compaction tasks executed since open.
    pub reorganizations: u64,
    pub worker: WorkerStatus,
    /// Calls to `put`, `get` and `delete` since open.
    pub operations: OpCounts,
    pub uptime: Duration,
}

impl LsmEngine {
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        let runs = self.registry.snapshot();
        let summary = LevelSummary::from_runs(
            runs.iter().map(|r| r.metadata()),
            self.config.compaction.max_levels,
        );

        EngineStats {
            memtable_variant: self.memtable.variant(),
            memtable_entries: self.memtable.entry_count(),
            memtable_bytes: self.memtable.size_bytes(),
            run_count: runs.len(),
            total_run_bytes: summary.sizes.iter().sum(),
            total_run_entries: runs.iter().map(|r| r.metadata().entry_count).sum(),
            level_run_counts: summary.run_counts,
            level_bytes: summary.sizes,
            reorganizations: self.worker.strategy().reorganization_count(),
            worker: self.worker.status(),
            operations: self.metrics.counts(),
            uptime: self.metrics.uptime(),
        }
    }
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "memtable: {} ({} entries, {} bytes)",
            self.memtable_variant, self.memtable_entries, self.memtable_bytes
        )?;
        writeln!(
            f,
            "runs: {} ({} bytes, {} entries)",
            self.run_count, self.total_run_bytes, self.total_run_entries
        )?;
        for (level, (&count, &bytes)) in self
            .level_run_counts
            .iter()
            .zip(&self.level_bytes)
            .enumerate()
        {
            if count > 0 {
                writeln!(f, "  L{}: {} run(s), {} bytes", level, count, bytes)?;
            }
        }
        writeln!(f, "reorganizations: {}", self.reorganizations)?;
        writeln!(
            f,
            "operations: {} (put {}, get {}, delete {})",
            self.operations.total(),
            self.operations.puts,
            self.operations.gets,
            self.operations.deletes
        )?;
        writeln!(f, "uptime: {}s", self.uptime.as_secs())?;
        write!(
            f,
            "worker: {} (submitted {}, completed {}, failed {}, skipped {})",
            if self.worker.running { "running" } else { "stopped" },
            self.worker.submitted,
            self.worker.completed,
            self.worker.failed,
            self.worker.skipped
        )
    }
}
