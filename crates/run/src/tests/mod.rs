use std::path::{Path, PathBuf};

use anyhow::Result;
use memtable::Entry;

use crate::*;

mod registry_tests;

pub(crate) fn val(v: &str) -> Entry {
    Entry::Value(v.to_string())
}

/// Writes `entries` (sorted here) as run `id` at `level` and opens it.
pub(crate) fn write_run(
    dir: &Path,
    level: usize,
    id: u64,
    entries: &[(&str, Option<&str>)],
) -> Result<RunReader> {
    let path = run_path(dir, level, id);
    let mut owned: Vec<(String, Entry)> = entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.map_or(Entry::Tombstone, val)))
        .collect();
    owned.sort_by(|a, b| a.0.cmp(&b.0));
    let n = owned.len();
    RunWriter::write(&path, level, id, n, owned.into_iter().map(Ok))?;
    RunReader::open(&path)
}

pub(crate) fn run_path(dir: &Path, level: usize, id: u64) -> PathBuf {
    dir.join(run_file_name(level, id))
}
