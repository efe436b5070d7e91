use std::collections::BTreeMap;
use std::ops::Bound;

use config::MemtableVariant;

use crate::{entry_cost, Entry, Memtable, OrderedMemtable, SizeTracker};

/// Balanced-tree memtable. Ordered, logarithmic everything.
#[derive(Debug)]
pub struct BTreeMemtable {
    map: BTreeMap<String, Entry>,
    size: SizeTracker,
    max_size: usize,
}

impl BTreeMemtable {
    pub fn new(max_size: usize) -> Self {
        Self {
            map: BTreeMap::new(),
            size: SizeTracker::default(),
            max_size,
        }
    }
}

impl Memtable for BTreeMemtable {
    fn variant(&self) -> MemtableVariant {
        MemtableVariant::BTree
    }

    fn insert(&mut self, key: String, entry: Entry) {
        let new_cost = entry_cost(&key, &entry);
        let old_cost = self.map.get(&key).map(|old| entry_cost(&key, old));
        self.size.replace(old_cost, new_cost);
        self.map.insert(key, entry);
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
        self.size.reset();
    }

    fn entries(&self) -> Vec<(String, Entry)> {
        self.map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn as_ordered(&self) -> Option<&dyn OrderedMemtable> {
        Some(self)
    }
}

impl OrderedMemtable for BTreeMemtable {
    fn range_query(&self, start: &str, end: &str) -> Vec<(String, Entry)> {
        self.map
            .range::<str, _>((Bound::Included(start), Bound::Unbounded))
            .take_while(|(k, _)| end.is_empty() || k.as_str() < end)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn prefix_search(&self, prefix: &str) -> Vec<(String, Entry)> {
        self.map
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
