/// Foreground compaction: `compact()`, `needs_compaction()` and
/// `compaction_plan()`.
///
/// These run on the caller's thread through the worker's blocking path, so
/// their results match what a background job over the same runs would
/// produce. With background compaction disabled this is the only way runs
/// get merged.
use ::compaction::{CompactionKind, CompactionTask};
use anyhow::Result;
use tracing::{debug, info};

use crate::LsmEngine;

impl LsmEngine {
    /// Whether the registered runs warrant a compaction.
    #[must_use]
    pub fn needs_compaction(&self) -> bool {
        self.worker
            .check_compaction_needed(&self.registry.file_names())
    }

    /// The task the next compaction would execute, if any.
    #[must_use]
    pub fn compaction_plan(&self) -> Option<CompactionTask> {
        self.worker.get_compaction_plan(&self.registry.file_names())
    }

    /// Compacts until the strategy has nothing left to plan. Returns the
    /// number of tasks executed.
    ///
    /// # Errors
    ///
    /// The first failing task's error. Its inputs stay registered, so calling
    /// `compact` again retries it.
    pub fn compact(&mut self) -> Result<usize> {
        let mut executed = 0;
        while let Some(task) = self.compaction_plan() {
            // Rewriting a lone run at its own level changes nothing.
            if task.strategy == CompactionKind::Size && task.input_files.len() < 2 {
                debug!(task = %task, "skipping single-run size merge");
                break;
            }
            let before = self.registry.file_names();
            let outputs = self
                .worker
                .execute_compaction_sync(&task.input_files)?;
            if self.registry.file_names() == before {
                debug!(task = %task, "compaction made no progress");
                break;
            }
            executed += 1;
            debug!(task = %task, outputs = ?outputs, "compaction step done");
        }
        if executed > 0 {
            info!(tasks = executed, runs = self.registry.len(), "compaction finished");
        }
        Ok(executed)
    }
}
