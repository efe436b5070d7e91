use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use config::EngineConfig;

use crate::*;


/// Foreground-only engine over `dir`: no background worker, level-0 cap 4,
/// level-0 merges never promoted.
pub(crate) fn test_config(dir: &Path, max_memtable_size: usize) -> EngineConfig {
    EngineConfig::builder()
        .data_dir(dir)
        .memtable_variant(MemtableVariant::BTree)
        .max_memtable_size_bytes(max_memtable_size)
        .enable_background_compaction(false)
        .compaction(CompactionConfig {
            level0_max_runs: 4,
            level0_promote_bytes: u64::MAX,
            ..CompactionConfig::default()
        })
        .build()
}

pub(crate) fn open_engine(dir: &Path, max_memtable_size: usize) -> Result<LsmEngine> {
    LsmEngine::open(test_config(dir, max_memtable_size))
}

/// Writes `pairs` and flushes them as one level-0 run.
pub(crate) fn flush_pairs<K, V>(engine: &mut LsmEngine, pairs: &[(K, V)]) -> Result<()>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    for (k, v) in pairs {
        engine.put(k.as_ref(), v.as_ref())?;
    }
    engine.flush()?;
    Ok(())
}

pub(crate) fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
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
