use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use config::CompactionConfig;
use memtable::Entry;
use parking_lot::Mutex;
use run::{parse_run_file_name, MergeIterator, RunMetadata, RunReader, RunRegistry};
use tracing::{debug, info, warn};

use crate::{CompactionError, CompactionKind, CompactionTask};

/// Entries merged between two looks at the cancellation flag.
pub const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Run count and byte total per level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSummary {
    pub run_counts: Vec<usize>,
    pub sizes: Vec<u64>,
}

impl LevelSummary {
    #[must_use]
    pub fn new(max_levels: usize) -> Self {
        Self {
            run_counts: vec![0; max_levels],
            sizes: vec![0; max_levels],
        }
    }

    /// Records one run. Levels past the last are folded into the last.
    pub fn add(&mut self, level: usize, size_bytes: u64) {
        let level = level.min(self.run_counts.len().saturating_sub(1));
        self.run_counts[level] += 1;
        self.sizes[level] += size_bytes;
    }

    pub fn from_runs<'a, I>(runs: I, max_levels: usize) -> Self
    where
        I: IntoIterator<Item = &'a RunMetadata>,
    {
        let mut summary = Self::new(max_levels);
        for meta in runs {
            summary.add(meta.level, meta.size_bytes);
        }
        summary
    }

    /// Rebuilds a summary from run file names alone. The level comes from
    /// the name; the size from `registry` when the run is registered, else
    /// from the file in `registry`'s data directory, else zero. Names that
    /// are not run file names are skipped.
    pub fn from_file_names(names: &[String], registry: &RunRegistry, max_levels: usize) -> Self {
        let registered = registry.snapshot();
        let mut summary = Self::new(max_levels);
        for name in names {
            let Some((level, _)) = parse_run_file_name(name) else {
                warn!(file = %name, "ignoring name without a level tag");
                continue;
            };
            let size = registered
                .iter()
                .find(|r| r.file_name() == name)
                .map(|r| r.size_bytes())
                .or_else(|| file_len(&registry.data_dir().join(name)))
                .unwrap_or(0);
            summary.add(level, size);
        }
        summary
    }
}

fn file_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

/// Plans and executes compactions.
///
/// Planning is a pure function of a [`LevelSummary`] and the fixed
/// [`CompactionConfig`]. Execution merges runs from the registry; only one
/// execution runs at a time per strategy, whichever thread calls it.
pub struct CompactionStrategy {
    config: CompactionConfig,
    registry: Arc<RunRegistry>,
    reorganizations: AtomicU64,
    cancel: AtomicBool,
    exec_lock: Mutex<()>,
}

impl CompactionStrategy {
    pub fn new(config: CompactionConfig, registry: Arc<RunRegistry>) -> Self {
        Self {
            config,
            registry,
            reorganizations: AtomicU64::new(0),
            cancel: AtomicBool::new(false),
            exec_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CompactionConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// Number of successfully executed tasks.
    #[must_use]
    pub fn reorganization_count(&self) -> u64 {
        self.reorganizations.load(Ordering::Relaxed)
    }

    /// True iff level 0 holds at least `level0_max_runs` runs, or any deeper
    /// level holds at least its byte target.
    #[must_use]
    pub fn should_compact(&self, run_counts: &[usize], level_sizes: &[u64]) -> bool {
        if run_counts.first().copied().unwrap_or(0) >= self.config.level0_max_runs {
            return true;
        }
        level_sizes.iter().enumerate().skip(1).any(|(level, &size)| {
            self.config
                .target_bytes(level)
                .map_or(false, |target| size >= target)
        })
    }

    /// Picks the level to compact, if any: `(level, kind, priority)`.
    #[must_use]
    pub fn choose_level(&self, summary: &LevelSummary) -> Option<(usize, CompactionKind, usize)> {
        let last = self.config.max_levels.saturating_sub(1);
        let mut best: Option<(usize, CompactionKind, usize)> = None;

        for (level, &count) in summary.run_counts.iter().enumerate() {
            let candidate = if level == 0 {
                (count >= self.config.level0_max_runs).then_some(CompactionKind::Size)
            } else {
                let near_cap = count > 0 && count + 1 >= self.config.level_max_runs;
                let over_target = self
                    .config
                    .target_bytes(level)
                    .map_or(false, |target| summary.sizes[level] >= target);
                // A lone run on the deepest level has nowhere to go.
                let movable = level < last || count > 1;
                ((near_cap || over_target) && movable).then_some(CompactionKind::Level)
            };

            if let Some(kind) = candidate {
                if best.map_or(true, |(_, _, priority)| count > priority) {
                    best = Some((level, kind, count));
                }
            }
        }
        best
    }

    /// Builds the task for the most pressing level among `runs`.
    #[must_use]
    pub fn plan_compaction(&self, runs: &[RunMetadata]) -> Option<CompactionTask> {
        let summary = LevelSummary::from_runs(runs, self.config.max_levels);
        let (level, strategy, priority) = self.choose_level(&summary)?;
        let last = self.config.max_levels.saturating_sub(1);

        let mut inputs: Vec<&RunMetadata> = runs
            .iter()
            .filter(|meta| meta.level.min(last) == level)
            .collect();
        inputs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        Some(CompactionTask {
            level,
            input_files: inputs.iter().map(|m| m.file_name.clone()).collect(),
            output_files: Vec::new(),
            strategy,
            priority,
        })
    }

    /// Level the output of `task` is written to, given its inputs' total
    /// size on disk.
    #[must_use]
    pub fn output_level(&self, task: &CompactionTask, input_bytes: u64) -> usize {
        let last = self.config.max_levels.saturating_sub(1);
        match task.strategy {
            CompactionKind::Level => (task.level + 1).min(last),
            CompactionKind::Size => {
                if task.level == 0 && input_bytes >= self.config.level0_promote_bytes {
                    1.min(last)
                } else {
                    task.level
                }
            }
        }
    }

    /// Asks a running merge to stop at its next check.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn clear_cancel(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Merges the task's inputs into at most one new run and swaps it into
    /// the registry. Returns the new file names (empty when every entry was
    /// a droppable tombstone).
    ///
    /// On any failure the inputs stay registered and untouched, so the same
    /// task can be planned and retried later.
    pub fn execute_compaction(&self, task: &CompactionTask) -> Result<Vec<String>> {
        let _guard = self.exec_lock.lock();

        let inputs = self
            .registry
            .resolve(&task.input_files)
            .map_err(CompactionError::MissingRun)?;
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let created_at = inputs.iter().map(|r| r.created_at()).max().unwrap_or(0);
        let input_bytes: u64 = inputs.iter().map(|r| r.size_bytes()).sum();
        let expected: usize = inputs.iter().map(|r| r.len()).sum();
        let out_level = self.output_level(task, input_bytes);

        // Runs outside the merge that hold older data; a tombstone must
        // survive while any of them still has the key.
        let oldest_input = inputs.iter().map(|r| r.created_at()).min().unwrap_or(0);
        let older: Vec<Arc<RunReader>> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|r| !task.input_files.iter().any(|f| f == r.file_name()))
            .filter(|r| r.created_at() < oldest_input)
            .collect();

        debug!(
            task = %task,
            out_level,
            created_at,
            older_runs = older.len(),
            "executing compaction"
        );

        let merged = MergeIterator::over_runs(&inputs);
        let filtered = CompactionStream {
            inner: merged,
            older: &older,
            cancel: &self.cancel,
            seen: 0,
        };
        let output = self
            .registry
            .build_run(out_level, Some(created_at), expected, filtered)?;

        let outputs: Vec<Arc<RunReader>> = output.into_iter().collect();
        let names: Vec<String> = outputs.iter().map(|r| r.file_name().to_string()).collect();
        let output_entries: usize = outputs.iter().map(|r| r.len()).sum();

        if let Err(e) = self.registry.replace(&task.input_files, outputs) {
            for name in &names {
                let _ = std::fs::remove_file(self.registry.data_dir().join(name));
            }
            return Err(e);
        }

        self.reorganizations.fetch_add(1, Ordering::Relaxed);
        info!(
            kind = %task.strategy,
            level = task.level,
            out_level,
            inputs = task.input_files.len(),
            entries_in = expected,
            entries_out = output_entries,
            "compaction finished"
        );
        Ok(names)
    }
}

impl std::fmt::Debug for CompactionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactionStrategy")
            .field("config", &self.config)
            .field("reorganizations", &self.reorganization_count())
            .finish()
    }
}

/// Merge output with tombstone GC and cancellation checks applied.
struct CompactionStream<'a> {
    inner: MergeIterator<'a>,
    older: &'a [Arc<RunReader>],
    cancel: &'a AtomicBool,
    seen: usize,
}

impl CompactionStream<'_> {
    fn shadows_older_data(&self, key: &str) -> Result<bool> {
        for run in self.older {
            if run.get(key)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Iterator for CompactionStream<'_> {
    type Item = Result<(String, Entry)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.seen % CANCEL_CHECK_INTERVAL == 0 && self.cancel.load(Ordering::SeqCst) {
                return Some(Err(CompactionError::Cancelled.into()));
            }
            let (key, entry) = match self.inner.next_entry() {
                Ok(Some(pair)) => pair,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };
            self.seen += 1;

            if entry.is_tombstone() {
                match self.shadows_older_data(&key) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => return Some(Err(e)),
                }
            }
            return Some(Ok((key, entry)));
        }
    }
}
