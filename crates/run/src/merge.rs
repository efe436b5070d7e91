//! K-way merge over sorted entry sources.
//!
//! Sources are given newest first. When a key appears in several sources
//! only the entry from the lowest-numbered (newest) source is emitted; the
//! others are skipped. Tombstones are passed through, callers decide what to
//! do with them.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use anyhow::Result;
use memtable::Entry;

use crate::RunReader;

/// One sorted input to a merge.
pub type EntrySource<'a> = Box<dyn Iterator<Item = Result<(String, Entry)>> + 'a>;

/// The current head of one source.
struct HeapEntry {
    key: String,
    entry: Entry,
    /// Position of the source in the newest-first list.
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source == other.source
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: smallest key first, then newest source.
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// Merges sorted sources into one sorted, de-duplicated stream.
pub struct MergeIterator<'a> {
    sources: Vec<EntrySource<'a>>,
    heap: BinaryHeap<HeapEntry>,
    /// An error met while refilling the heap, reported on the next call.
    pending_err: Option<anyhow::Error>,
    primed: bool,
}

impl<'a> MergeIterator<'a> {
    /// `sources` must be ordered newest first and each must yield strictly
    /// ascending keys.
    pub fn new(sources: Vec<EntrySource<'a>>) -> Self {
        Self {
            sources,
            heap: BinaryHeap::new(),
            pending_err: None,
            primed: false,
        }
    }

    /// Merges whole runs; `runs` must be ordered newest first.
    pub fn over_runs(runs: &'a [Arc<RunReader>]) -> Self {
        Self::new(
            runs.iter()
                .map(|r| Box::new(r.iter()) as EntrySource<'a>)
                .collect(),
        )
    }

    /// Pulls the next entry of `source` onto the heap.
    fn advance(&mut self, source: usize) {
        match self.sources[source].next() {
            Some(Ok((key, entry))) => self.heap.push(HeapEntry { key, entry, source }),
            Some(Err(e)) => {
                if self.pending_err.is_none() {
                    self.pending_err = Some(e);
                }
            }
            None => {}
        }
    }

    /// Next `(key, entry)` in ascending key order, or `None` once every
    /// source is exhausted.
    pub fn next_entry(&mut self) -> Result<Option<(String, Entry)>> {
        if !self.primed {
            self.primed = true;
            for source in 0..self.sources.len() {
                self.advance(source);
            }
        }
        if let Some(e) = self.pending_err.take() {
            return Err(e);
        }

        let top = match self.heap.pop() {
            Some(top) => top,
            None => return Ok(None),
        };
        self.advance(top.source);

        // Older copies of the same key.
        while self.heap.peek().map_or(false, |next| next.key == top.key) {
            if let Some(dup) = self.heap.pop() {
                self.advance(dup.source);
            }
        }

        if let Some(e) = self.pending_err.take() {
            return Err(e);
        }
        Ok(Some((top.key, top.entry)))
    }
}

impl Iterator for MergeIterator<'_> {
    type Item = Result<(String, Entry)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
