use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use config::CompactionConfig;
use memtable::Entry;
use run::{MergeIterator, RunReader, RunRegistry};
use tempfile::TempDir;

use crate::*;

mod worker_tests;

/// Small caps; level-0 merges never promote unless a test asks for it.
pub(crate) fn test_config() -> CompactionConfig {
    CompactionConfig {
        level0_max_runs: 4,
        level_max_runs: 10,
        base_level_bytes: 1 << 20,
        level_size_multiplier: 10,
        max_levels: 4,
        level0_promote_bytes: u64::MAX,
    }
}

pub(crate) struct Fixture {
    pub dir: TempDir,
    pub registry: Arc<RunRegistry>,
    pub strategy: Arc<CompactionStrategy>,
}

pub(crate) fn fixture(config: CompactionConfig) -> Result<Fixture> {
    let dir = tempfile::tempdir()?;
    let registry = Arc::new(RunRegistry::open(dir.path())?);
    let strategy = Arc::new(CompactionStrategy::new(config, Arc::clone(&registry)));
    Ok(Fixture {
        dir,
        registry,
        strategy,
    })
}

fn owned(pairs: &[(&str, Option<&str>)]) -> Vec<(String, Entry)> {
    let mut out: Vec<(String, Entry)> = pairs
        .iter()
        .map(|(k, v)| {
            let entry = match v {
                Some(v) => Entry::Value(v.to_string()),
                None => Entry::Tombstone,
            };
            (k.to_string(), entry)
        })
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

/// Flushes `pairs` as a new level-0 run.
pub(crate) fn flush(registry: &RunRegistry, pairs: &[(&str, Option<&str>)]) -> Result<Arc<RunReader>> {
    registry.flush(owned(pairs))
}

/// Writes and registers a run directly at `level`.
pub(crate) fn add_run(
    registry: &RunRegistry,
    level: usize,
    pairs: &[(&str, Option<&str>)],
) -> Result<Arc<RunReader>> {
    let entries = owned(pairs);
    let n = entries.len();
    let run = registry
        .build_run(level, None, n, entries.into_iter().map(Ok))?
        .context("no entries")?;
    registry.add(Arc::clone(&run));
    Ok(run)
}

/// Everything the registry exposes, newest version per key, tombstones kept.
pub(crate) fn contents(registry: &RunRegistry) -> Result<Vec<(String, Entry)>> {
    let runs = registry.snapshot();
    MergeIterator::over_runs(&runs).collect()
}

pub(crate) fn val(v: &str) -> Entry {
    Entry::Value(v.to_string())
}

pub(crate) fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}
