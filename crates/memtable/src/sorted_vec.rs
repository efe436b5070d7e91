use config::MemtableVariant;

use crate::{entry_cost, Entry, Memtable, OrderedMemtable, SizeTracker};

/// Sorted array memtable.
///
/// Lookups binary-search a single `Vec`; inserts shift the tail, which is
/// cheap for the small, append-mostly buffers this is meant for.
#[derive(Debug)]
pub struct SortedVecMemtable {
    entries: Vec<(String, Entry)>,
    size: SizeTracker,
    max_size: usize,
}

impl SortedVecMemtable {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            size: SizeTracker::default(),
            max_size,
        }
    }

    fn search(&self, key: &str) -> Result<usize, usize> {
        self.entries.binary_search_by(|(k, _)| k.as_str().cmp(key))
    }

    /// First index whose key is `>= key`.
    fn lower_bound(&self, key: &str) -> usize {
        self.entries.partition_point(|(k, _)| k.as_str() < key)
    }
}

impl Memtable for SortedVecMemtable {
    fn variant(&self) -> MemtableVariant {
        MemtableVariant::SortedVec
    }

    fn insert(&mut self, key: String, entry: Entry) {
        let new_cost = entry_cost(&key, &entry);
        match self.search(&key) {
            Ok(pos) => {
                let old_cost = entry_cost(&key, &self.entries[pos].1);
                self.size.replace(Some(old_cost), new_cost);
                self.entries[pos].1 = entry;
            }
            Err(pos) => {
                self.size.replace(None, new_cost);
                self.entries.insert(pos, (key, entry));
            }
        }
    }

    fn get(&self, key: &str) -> Option<&Entry> {
        self.search(key).ok().map(|pos| &self.entries[pos].1)
    }

    fn size_bytes(&self) -> usize {
        self.size.used()
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.size.reset();
    }

    fn entries(&self) -> Vec<(String, Entry)> {
        self.entries.clone()
    }

    fn as_ordered(&self) -> Option<&dyn OrderedMemtable> {
        Some(self)
    }
}

impl OrderedMemtable for SortedVecMemtable {
    fn range_query(&self, start: &str, end: &str) -> Vec<(String, Entry)> {
        let from = self.lower_bound(start);
        let to = if end.is_empty() {
            self.entries.len()
        } else {
            self.lower_bound(end).max(from)
        };
        self.entries[from..to].to_vec()
    }

    fn prefix_search(&self, prefix: &str) -> Vec<(String, Entry)> {
        let from = self.lower_bound(prefix);
        self.entries[from..]
            .iter()
            .take_while(|(k, _)| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}
