use config::MemtableVariant;

use crate::{entry_cost, Entry, Memtable, SizeTracker};

/// Unsorted vector with linear lookup.
///
/// The cheapest structure to hold and to clear. Every lookup and every
/// overwrite scans, so it only suits small thresholds.
#[derive(Debug)]
pub struct VectorMemtable {
    entries: Vec<(String, Entry)>,
    size: SizeTracker,
    max_size: usize,
}

impl VectorMemtable {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Vec::new(),
            size: SizeTracker::default(),
            max_size,
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

impl Memtable for VectorMemtable {
    fn variant(&self) -> MemtableVariant {
        MemtableVariant::Vector
    }

    fn insert(&mut self, key: String, entry: Entry) {
        let new_cost = entry_cost(&key, &entry);
        match self.position(&key) {
            Some(pos) => {
                let old_cost = entry_cost(&key, &self.entries[pos].1);
                self.size.replace(Some(old_cost), new_cost);
                self.entries[pos].1 = entry;
            }
            None => {
                self.size.replace(None, new_cost);
                self.entries.push((key, entry));
            }
        }
    }

    fn get(&self, key: &str) -> Option<&Entry> {
        self.position(key).map(|pos| &self.entries[pos].1)
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
}
