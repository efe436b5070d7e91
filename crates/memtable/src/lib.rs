//! # Memtable - in-memory write buffer
//!
//! Every write lands in the active memtable before it reaches disk. One
//! contract, [`Memtable`], and several interchangeable indexes behind it:
//!
//! | variant          | lookup      | insert      | ordered | notes                      |
//! |------------------|-------------|-------------|---------|----------------------------|
//! | [`BTreeMemtable`]        | O(log n) | O(log n) | yes | general purpose default    |
//! | [`SortedVecMemtable`]    | O(log n) | O(n)     | yes | compact, cache friendly    |
//! | [`HashLinkedMemtable`]   | O(1)     | O(1)     | no  | keeps insertion order      |
//! | [`SkipListMemtable`]     | O(log n) | O(log n) | yes | arena skip list            |
//! | [`HashSkipListMemtable`] | O(1)     | O(log n) | yes | hash lookups, sorted index |
//! | [`TrieMemtable`]         | O(len)   | O(len)   | yes | cheap prefix queries       |
//! | [`VectorMemtable`]       | O(n)     | O(n)     | no  | smallest overhead          |
//!
//! The variant is chosen once through [`create`]; callers only ever see a
//! `Box<dyn Memtable>`.
//!
//! ## Size accounting
//!
//! `size_bytes` is the sum of `key.len() + value.len()` over the entries
//! currently held (a tombstone counts its key only). Each implementation
//! adjusts it by the net delta on every insert, it is never recomputed.
//!
//! ## Deletes
//!
//! A delete stores [`Entry::Tombstone`]. `get` distinguishes a live value, a
//! tombstone and a miss: `Some(Entry::Value)`, `Some(Entry::Tombstone)`,
//! `None`. An empty string is an ordinary value.

use std::fmt;

use config::MemtableVariant;

mod btree;
mod hash_linked;
mod hash_skiplist;
mod skiplist;
mod sorted_vec;
mod trie;
mod vector;

pub use btree::BTreeMemtable;
pub use hash_linked::HashLinkedMemtable;
pub use hash_skiplist::HashSkipListMemtable;
pub use skiplist::SkipListMemtable;
pub use sorted_vec::SortedVecMemtable;
pub use trie::TrieMemtable;
pub use vector::VectorMemtable;

/// A value slot: either live data or a deletion marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A live value (possibly the empty string).
    Value(String),
    /// The key was deleted.
    Tombstone,
}

impl Entry {
    /// The live value, or `None` for a tombstone.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Entry::Value(v) => Some(v),
            Entry::Tombstone => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<String> {
        match self {
            Entry::Value(v) => Some(v),
            Entry::Tombstone => None,
        }
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Entry::Tombstone)
    }

    /// Bytes this entry contributes to `size_bytes` besides its key.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        match self {
            Entry::Value(v) => v.len(),
            Entry::Tombstone => 0,
        }
    }
}

/// Bytes a `(key, entry)` pair contributes to `size_bytes`.
#[must_use]
pub fn entry_cost(key: &str, entry: &Entry) -> usize {
    key.len() + entry.byte_len()
}

/// The contract every memtable variant satisfies.
///
/// Writes never fail. `put` and `delete` return `true` once `size_bytes`
/// has reached `max_size`, which the engine takes as a request to flush.
pub trait Memtable: Send + fmt::Debug {
    /// Which implementation this is.
    fn variant(&self) -> MemtableVariant;

    /// Inserts or overwrites `key`, keeping `size_bytes` exact.
    fn insert(&mut self, key: String, entry: Entry);

    /// Point lookup. `None` means the key was never written to this memtable.
    fn get(&self, key: &str) -> Option<&Entry>;

    /// Sum of key and value bytes currently held.
    fn size_bytes(&self) -> usize;

    /// Flush threshold in bytes.
    fn max_size(&self) -> usize;

    /// Number of distinct keys, tombstones included.
    fn entry_count(&self) -> usize;

    /// Drops every entry and resets `size_bytes` to zero.
    fn clear(&mut self);

    /// Snapshot of every entry. Sorted by key for ordered variants, in the
    /// variant's own order otherwise.
    fn entries(&self) -> Vec<(String, Entry)>;

    /// Range and prefix queries, for variants that keep keys sorted.
    fn as_ordered(&self) -> Option<&dyn OrderedMemtable> {
        None
    }

    /// Stores a live value. Returns the "please flush" signal.
    fn put(&mut self, key: String, value: String) -> bool {
        self.insert(key, Entry::Value(value));
        self.is_full()
    }

    /// Stores a tombstone. Returns the same signal as [`put`](Memtable::put).
    fn delete(&mut self, key: String) -> bool {
        self.insert(key, Entry::Tombstone);
        self.is_full()
    }

    fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    fn is_full(&self) -> bool {
        self.size_bytes() >= self.max_size()
    }

    /// Every entry in ascending key order, whatever the variant. Used by flush.
    fn sorted_entries(&self) -> Vec<(String, Entry)> {
        let mut entries = self.entries();
        if !self.variant().is_ordered() {
            entries.sort_by(|a, b| a.0.cmp(&b.0));
        }
        entries
    }
}

/// Extra queries offered by sorted variants.
pub trait OrderedMemtable {
    /// Entries with `start <= key < end`, ascending. An empty `end` means no
    /// upper bound.
    fn range_query(&self, start: &str, end: &str) -> Vec<(String, Entry)>;

    /// Entries whose key starts with `prefix`, ascending.
    fn prefix_search(&self, prefix: &str) -> Vec<(String, Entry)>;
}

/// Builds the memtable implementation for `variant`.
pub fn create(variant: MemtableVariant, max_size: usize) -> Box<dyn Memtable> {
    match variant {
        MemtableVariant::BTree => Box::new(BTreeMemtable::new(max_size)),
        MemtableVariant::SortedVec => Box::new(SortedVecMemtable::new(max_size)),
        MemtableVariant::HashLinked => Box::new(HashLinkedMemtable::new(max_size)),
        MemtableVariant::SkipList => Box::new(SkipListMemtable::new(max_size)),
        MemtableVariant::HashSkipList => Box::new(HashSkipListMemtable::new(max_size)),
        MemtableVariant::Trie => Box::new(TrieMemtable::new(max_size)),
        MemtableVariant::Vector => Box::new(VectorMemtable::new(max_size)),
    }
}

/// `start <= key < end`, with an empty `end` meaning unbounded.
#[must_use]
pub fn key_in_range(key: &str, start: &str, end: &str) -> bool {
    key >= start && (end.is_empty() || key < end)
}

/// Running byte total shared by the implementations.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SizeTracker {
    used: usize,
}

impl SizeTracker {
    /// Applies the net change of replacing `old` (if any) with `new`.
    pub(crate) fn replace(&mut self, old: Option<usize>, new: usize) {
        self.used = self.used + new - old.unwrap_or(0);
    }

    pub(crate) fn used(&self) -> usize {
        self.used
    }

    pub(crate) fn reset(&mut self) {
        self.used = 0;
    }
}

#[cfg(test)]
mod tests;
