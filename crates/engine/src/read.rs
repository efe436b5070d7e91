/// Read path: `get()`, `scan()` and `scan_prefix()`.
///
/// Point lookups check the memtable first, then runs newest first; the first
/// hit wins and a tombstone reads as "not found".
///
/// Scans merge the memtable and every run with [`MergeIterator`]. The
/// memtable is source 0 so it shadows every run, runs follow newest first,
/// and tombstones are dropped from the output.
use anyhow::Result;
use memtable::{key_in_range, Entry};
use run::{EntrySource, MergeIterator};

use crate::LsmEngine;

impl LsmEngine {
    /// Looks up `key`. `Ok(None)` means never written or deleted.
    ///
    /// The run list is snapshotted once, so a compaction swapping runs in
    /// the meantime cannot change the answer halfway through.
    ///
    /// # Errors
    ///
    /// Returns an error only if a run read fails (I/O, checksum).
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.metrics.record_get();
        if let Some(entry) = self.memtable.get(key) {
            return Ok(entry.value().map(str::to_owned));
        }
        Ok(self.registry.get(key)?.and_then(Entry::into_value))
    }

    /// Whether `key` currently has a live value.
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Live `(key, value)` pairs with `start <= key < end` in ascending key
    /// order. An empty `end` scans to the last key.
    pub fn scan(&self, start: &str, end: &str) -> Result<Vec<(String, String)>> {
        let mem = match self.memtable.as_ordered() {
            Some(ordered) => ordered.range_query(start, end),
            None => self
                .memtable
                .sorted_entries()
                .into_iter()
                .filter(|(k, _)| key_in_range(k, start, end))
                .collect(),
        };

        let runs = self.registry.snapshot();
        let mut sources: Vec<EntrySource<'_>> = Vec::with_capacity(runs.len() + 1);
        sources.push(Box::new(mem.into_iter().map(Ok::<_, anyhow::Error>)));
        for run in &runs {
            sources.push(Box::new(run.range(start, end)));
        }
        collect_live(MergeIterator::new(sources))
    }

    /// Live `(key, value)` pairs whose key starts with `prefix`, ascending.
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mem = match self.memtable.as_ordered() {
            Some(ordered) => ordered.prefix_search(prefix),
            None => self
                .memtable
                .sorted_entries()
                .into_iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .collect(),
        };

        let runs = self.registry.snapshot();
        let mut sources: Vec<EntrySource<'_>> = Vec::with_capacity(runs.len() + 1);
        sources.push(Box::new(mem.into_iter().map(Ok::<_, anyhow::Error>)));
        for run in &runs {
            // Errors pass through so the merge can report them.
            let matching = run
                .range(prefix, "")
                .take_while(move |item| item.as_ref().map_or(true, |(k, _)| k.starts_with(prefix)));
            sources.push(Box::new(matching));
        }
        collect_live(MergeIterator::new(sources))
    }
}

fn collect_live(merged: MergeIterator<'_>) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for item in merged {
        let (key, entry) = item?;
        if let Entry::Value(value) = entry {
            out.push((key, value));
        }
    }
    Ok(out)
}
