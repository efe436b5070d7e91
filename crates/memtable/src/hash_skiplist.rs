use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use config::MemtableVariant;

use crate::{entry_cost, Entry, Memtable, OrderedMemtable, SizeTracker};

/// Hash index for point lookups plus a sorted key index for ordered reads.
///
/// Every key is stored twice, which the size accounting does not count:
/// `size_bytes` tracks logical payload, not heap usage.
#[derive(Debug)]
pub struct HashSkipListMemtable {
    map: HashMap<String, Entry>,
    sorted: BTreeSet<String>,
    size: SizeTracker,
    max_size: usize,
}

impl HashSkipListMemtable {
    pub fn new(max_size: usize) -> Self {
        Self {
            map: HashMap::new(),
            sorted: BTreeSet::new(),
            size: SizeTracker::default(),
            max_size,
        }
    }

    fn collect<'a>(&self, keys: impl Iterator<Item = &'a String>) -> Vec<(String, Entry)> {
        keys.filter_map(|k| self.map.get(k).map(|e| (k.clone(), e.clone())))
            .collect()
    }
}

impl Memtable for HashSkipListMemtable {
    fn variant(&self) -> MemtableVariant {
        MemtableVariant::HashSkipList
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
                self.sorted.insert(key.clone());
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
        self.sorted.clear();
        self.size.reset();
    }

    fn entries(&self) -> Vec<(String, Entry)> {
        self.collect(self.sorted.iter())
    }

    fn as_ordered(&self) -> Option<&dyn OrderedMemtable> {
        Some(self)
    }
}

impl OrderedMemtable for HashSkipListMemtable {
    fn range_query(&self, start: &str, end: &str) -> Vec<(String, Entry)> {
        let keys = self
            .sorted
            .range::<str, _>((Bound::Included(start), Bound::Unbounded))
            .take_while(|k| end.is_empty() || k.as_str() < end);
        self.collect(keys)
    }

    fn prefix_search(&self, prefix: &str) -> Vec<(String, Entry)> {
        let keys = self
            .sorted
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|k| k.starts_with(prefix));
        self.collect(keys)
    }
}
