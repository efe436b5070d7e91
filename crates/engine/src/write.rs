/// Write path: `put()`, `delete()` and `flush()`.
///
/// Every mutation goes straight into the memtable. When the memtable reports
/// that it has reached its byte threshold the engine flushes it into a new
/// level-0 run before returning.
use anyhow::{Context, Result};
use ::compaction::LevelSummary;
use run::{MAX_KEY_BYTES, MAX_VALUE_BYTES};
use tracing::{debug, info};

use crate::LsmEngine;

impl LsmEngine {
    /// Inserts or overwrites `key`.
    ///
    /// If the memtable is full afterwards it is flushed synchronously. A
    /// failed flush is returned as an error; the write itself stays in the
    /// memtable.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        check_key(&key)?;
        anyhow::ensure!(
            value.len() <= MAX_VALUE_BYTES,
            "value too large: {} bytes (max {})",
            value.len(),
            MAX_VALUE_BYTES
        );

        self.metrics.record_put();
        debug!(op = "put", key = %key, value_len = value.len(), "write");
        if self.memtable.put(key, value) {
            self.flush()?;
        }
        Ok(())
    }

    /// Deletes `key` by writing a tombstone, which shadows any older value in
    /// the runs until compaction can drop it.
    pub fn delete(&mut self, key: impl Into<String>) -> Result<()> {
        let key = key.into();
        check_key(&key)?;

        self.metrics.record_delete();
        debug!(op = "delete", key = %key, "write");
        if self.memtable.delete(key) {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes the memtable to a new level-0 run and clears it, then hands
    /// the run list to the compaction worker if the strategy asks for it.
    ///
    /// Returns the new run's file name, or `None` when the memtable was
    /// empty.
    ///
    /// # Errors
    ///
    /// An I/O error from writing the run. The memtable is left untouched so
    /// the flush can be retried.
    pub fn flush(&mut self) -> Result<Option<String>> {
        if self.memtable.is_empty() {
            return Ok(None);
        }
        let name = self.flush_memtable()?;
        self.schedule_compaction();
        Ok(Some(name))
    }

    /// Snapshot, write, register, clear. Nothing is cleared unless the run
    /// is registered.
    pub(crate) fn flush_memtable(&mut self) -> Result<String> {
        let entries = self.memtable.sorted_entries();
        let count = entries.len();
        let bytes = self.memtable.size_bytes();

        let run = self
            .registry
            .flush(entries)
            .with_context(|| format!("flushing {} memtable entries", count))?;
        self.memtable.clear();

        info!(
            file = run.file_name(),
            entries = count,
            memtable_bytes = bytes,
            run_bytes = run.size_bytes(),
            "memtable flushed"
        );
        Ok(run.file_name().to_string())
    }

    /// Submits the current run list to the worker when the strategy says a
    /// compaction is due. Returns whether a job was queued.
    pub(crate) fn schedule_compaction(&self) -> bool {
        let strategy = self.worker.strategy();
        let snapshot = self.registry.snapshot();
        let summary = LevelSummary::from_runs(
            snapshot.iter().map(|r| r.metadata()),
            strategy.config().max_levels,
        );
        if !strategy.should_compact(&summary.run_counts, &summary.sizes) {
            return false;
        }
        if !self.worker.is_running() {
            debug!(
                level0_runs = summary.run_counts.first().copied().unwrap_or(0),
                "compaction warranted, background compaction off"
            );
            return false;
        }
        let files = snapshot.iter().map(|r| r.file_name().to_string()).collect();
        self.worker.submit(files)
    }
}

fn check_key(key: &str) -> Result<()> {
    anyhow::ensure!(
        key.len() <= MAX_KEY_BYTES,
        "key too large: {} bytes (max {})",
        key.len(),
        MAX_KEY_BYTES
    );
    Ok(())
}
