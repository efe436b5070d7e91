use std::collections::HashMap;

use config::MemtableVariant;

use crate::{entry_cost, Entry, Memtable, SizeTracker};

/// Hash map plus an insertion-order key list.
///
/// Constant-time point operations; no ordering, so flush sorts a copy.
/// An overwrite keeps the key's original position in the order list.
#[derive(Debug)]
pub struct HashLinkedMemtable {
    map: HashMap<String, Entry>,
    order: Vec<String>,
    size: SizeTracker,
    max_size: usize,
}

impl HashLinkedMemtable {
    pub fn new(max_size: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: Vec::new(),
            size: SizeTracker::default(),
            max_size,
        }
    }
}

impl Memtable for HashLinkedMemtable {
    fn variant(&self) -> MemtableVariant {
        MemtableVariant::HashLinked
    }

    fn insert(&mut self, key: String, entry: Entry) {
        let new_cost = entry_cost(&key, &entry);
        match self.map.get_mut(&key) {
            Some(slot) => {
                self.size.replace(Some(entry_cost(&key, slot)), new_cost);
                *slot = entry;
            }
            None => {
                self.size.replace(None, new_cost);
                self.order.push(key.clone());
                self.map.insert(key, entry);
            }
        }
    }

    fn get(&self, key: &str) -> Option<&Entry> {
        self.map.get(key)
    }

    fn size_bytes(&self) -> usize {
        self.size.used()
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn entry_count(&self) -> usize {
        self.map.len()
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
        self.size.reset();
    }

    /// Entries in insertion order.
    fn entries(&self) -> Vec<(String, Entry)> {
        self.order
            .iter()
            .filter_map(|k| self.map.get(k).map(|e| (k.clone(), e.clone())))
            .collect()
    }
}
