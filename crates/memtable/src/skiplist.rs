use config::MemtableVariant;
use rand::Rng;

use crate::{entry_cost, Entry, Memtable, OrderedMemtable, SizeTracker};

/// Maximum tower height.
pub const MAX_HEIGHT: usize = 12;

/// A node lives in the arena; `next[i]` is the index of its successor on
/// level `i`.
#[derive(Debug)]
struct Node {
    key: String,
    entry: Entry,
    next: Vec<Option<usize>>,
}

/// Arena-backed skip list memtable.
///
/// Nodes are stored in a `Vec` and linked by index, so there is no unsafe
/// code and no per-node allocation besides the key and value. Level 0 is a
/// sorted list of every key; each higher level keeps roughly a quarter of
/// the one below.
///
/// ```text
/// L2:  head ──────────► c ──────────────► NIL
/// L1:  head ──► a ────► c ──────► f ────► NIL
/// L0:  head ──► a ► b ► c ► d ► e ► f ► g NIL
/// ```
#[derive(Debug)]
pub struct SkipListMemtable {
    nodes: Vec<Node>,
    head: [Option<usize>; MAX_HEIGHT],
    height: usize,
    size: SizeTracker,
    max_size: usize,
}

impl SkipListMemtable {
    pub fn new(max_size: usize) -> Self {
        Self {
            nodes: Vec::new(),
            head: [None; MAX_HEIGHT],
            height: 1,
            size: SizeTracker::default(),
            max_size,
        }
    }

    /// Successor of `at` (or of the head when `None`) on `level`.
    fn next_of(&self, at: Option<usize>, level: usize) -> Option<usize> {
        match at {
            None => self.head[level],
            Some(idx) => self.nodes[idx].next[level],
        }
    }

    /// For each level, the last node whose key is `< key` (`None` = head).
    fn predecessors(&self, key: &str) -> [Option<usize>; MAX_HEIGHT] {
        let mut preds = [None; MAX_HEIGHT];
        let mut cur: Option<usize> = None;
        for level in (0..self.height).rev() {
            while let Some(next) = self.next_of(cur, level) {
                if self.nodes[next].key.as_str() < key {
                    cur = Some(next);
                } else {
                    break;
                }
            }
            preds[level] = cur;
        }
        preds
    }

    /// First node whose key is `>= key`.
    fn seek(&self, key: &str) -> Option<usize> {
        let preds = self.predecessors(key);
        self.next_of(preds[0], 0)
    }

    fn find(&self, key: &str) -> Option<usize> {
        self.seek(key).filter(|&idx| self.nodes[idx].key == key)
    }

    pub(crate) fn random_height() -> usize {
        let mut rng = rand::thread_rng();
        let mut height = 1;
        while height < MAX_HEIGHT && rng.gen_ratio(1, 4) {
            height += 1;
        }
        height
    }

    /// Walks level 0 from `from`.
    fn iter_from(&self, from: Option<usize>) -> Iter<'_> {
        Iter {
            list: self,
            cur: from,
        }
    }
}

struct Iter<'a> {
    list: &'a SkipListMemtable,
    cur: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a Entry);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cur?;
        let node = &self.list.nodes[idx];
        self.cur = node.next[0];
        Some((node.key.as_str(), &node.entry))
    }
}

impl Memtable for SkipListMemtable {
    fn variant(&self) -> MemtableVariant {
        MemtableVariant::SkipList
    }

    fn insert(&mut self, key: String, entry: Entry) {
        let new_cost = entry_cost(&key, &entry);
        let preds = self.predecessors(&key);

        if let Some(idx) = self.next_of(preds[0], 0) {
            if self.nodes[idx].key == key {
                let old_cost = entry_cost(&key, &self.nodes[idx].entry);
                self.size.replace(Some(old_cost), new_cost);
                self.nodes[idx].entry = entry;
                return;
            }
        }

        let height = Self::random_height();
        // Levels above the old height start from the head, which `preds`
        // already holds as `None`.
        self.height = self.height.max(height);

        let idx = self.nodes.len();
        let mut next = vec![None; height];
        for (level, slot) in next.iter_mut().enumerate() {
            *slot = self.next_of(preds[level], level);
        }
        self.nodes.push(Node { key, entry, next });
        for (level, pred) in preds.iter().enumerate().take(height) {
            match *pred {
                None => self.head[level] = Some(idx),
                Some(p) => self.nodes[p].next[level] = Some(idx),
            }
        }
        self.size.replace(None, new_cost);
    }

    fn get(&self, key: &str) -> Option<&Entry> {
        self.find(key).map(|idx| &self.nodes[idx].entry)
    }

    fn size_bytes(&self) -> usize {
        self.size.used()
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn entry_count(&self) -> usize {
        self.nodes.len()
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.head = [None; MAX_HEIGHT];
        self.height = 1;
        self.size.reset();
    }

    fn entries(&self) -> Vec<(String, Entry)> {
        self.iter_from(self.head[0])
            .map(|(k, e)| (k.to_string(), e.clone()))
            .collect()
    }

    fn as_ordered(&self) -> Option<&dyn OrderedMemtable> {
        Some(self)
    }
}

impl OrderedMemtable for SkipListMemtable {
    fn range_query(&self, start: &str, end: &str) -> Vec<(String, Entry)> {
        self.iter_from(self.seek(start))
            .take_while(|(k, _)| end.is_empty() || *k < end)
            .map(|(k, e)| (k.to_string(), e.clone()))
            .collect()
    }

    fn prefix_search(&self, prefix: &str) -> Vec<(String, Entry)> {
        self.iter_from(self.seek(prefix))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, e)| (k.to_string(), e.clone()))
            .collect()
    }
}

#[cfg(test)]
impl SkipListMemtable {
    pub(crate) fn height(&self) -> usize {
        self.height
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn heads_are_empty(&self) -> bool {
        self.head.iter().all(Option::is_none)
    }

    /// Keys linked on `level`, in list order.
    pub(crate) fn level_keys(&self, level: usize) -> Vec<&str> {
        let mut keys = Vec::new();
        let mut cur = self.head[level];
        while let Some(idx) = cur {
            keys.push(self.nodes[idx].key.as_str());
            cur = self.nodes[idx].next[level];
        }
        keys
    }
}
