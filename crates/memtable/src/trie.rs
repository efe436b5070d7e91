use std::collections::BTreeMap;

use config::MemtableVariant;

use crate::{entry_cost, Entry, Memtable, OrderedMemtable, SizeTracker};

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<char, Node>,
    entry: Option<Entry>,
}

// Dropping a chain of nested maps recurses once per character, so a long
// key would overflow the stack. Unlink subtrees onto a heap stack instead.
impl Drop for Node {
    fn drop(&mut self) {
        let mut stack: Vec<Node> = std::mem::take(&mut self.children).into_values().collect();
        while let Some(mut node) = stack.pop() {
            stack.extend(std::mem::take(&mut node.children).into_values());
        }
    }
}

/// Character trie.
///
/// Children are kept in a `BTreeMap`, so a depth-first walk yields keys in
/// ascending order and a prefix query is a descent plus a subtree walk.
/// Walks and drops are iterative, so very long keys do not grow the call
/// stack.
#[derive(Debug)]
pub struct TrieMemtable {
    root: Node,
    len: usize,
    size: SizeTracker,
    max_size: usize,
}

impl TrieMemtable {
    pub fn new(max_size: usize) -> Self {
        Self {
            root: Node::default(),
            len: 0,
            size: SizeTracker::default(),
            max_size,
        }
    }

    fn node(&self, key: &str) -> Option<&Node> {
        let mut cur = &self.root;
        for ch in key.chars() {
            cur = cur.children.get(&ch)?;
        }
        Some(cur)
    }

    /// Every entry under `start`, ascending, with `base` as the key prefix.
    ///
    /// One key buffer is shared by the walk: each stacked child remembers the
    /// length of its parent's key and truncates back to it when popped.
    fn walk(start: &Node, base: String) -> Vec<(String, Entry)> {
        let mut out = Vec::new();
        let mut stack = vec![(start, base.len(), None)];
        let mut key = base;
        while let Some((node, parent_len, ch)) = stack.pop() {
            key.truncate(parent_len);
            if let Some(ch) = ch {
                key.push(ch);
            }
            if let Some(entry) = &node.entry {
                out.push((key.clone(), entry.clone()));
            }
            // Reverse so the smallest child is popped first.
            for (ch, child) in node.children.iter().rev() {
                stack.push((child, key.len(), Some(*ch)));
            }
        }
        out
    }
}

impl Memtable for TrieMemtable {
    fn variant(&self) -> MemtableVariant {
        MemtableVariant::Trie
    }

    fn insert(&mut self, key: String, entry: Entry) {
        let new_cost = entry_cost(&key, &entry);
        let mut cur = &mut self.root;
        for ch in key.chars() {
            cur = cur.children.entry(ch).or_default();
        }
        let old_cost = cur.entry.as_ref().map(|old| entry_cost(&key, old));
        if old_cost.is_none() {
            self.len += 1;
        }
        cur.entry = Some(entry);
        self.size.replace(old_cost, new_cost);
    }

    fn get(&self, key: &str) -> Option<&Entry> {
        self.node(key).and_then(|n| n.entry.as_ref())
    }

    fn size_bytes(&self) -> usize {
        self.size.used()
    }

    fn max_size(&self) -> usize {
        self.max_size
    }

    fn entry_count(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.root = Node::default();
        self.len = 0;
        self.size.reset();
    }

    fn entries(&self) -> Vec<(String, Entry)> {
        Self::walk(&self.root, String::new())
    }

    fn as_ordered(&self) -> Option<&dyn OrderedMemtable> {
        Some(self)
    }
}

impl OrderedMemtable for TrieMemtable {
    fn range_query(&self, start: &str, end: &str) -> Vec<(String, Entry)> {
        // DFS order matches byte order for UTF-8 keys, so a filtered walk
        // is already sorted.
        self.entries()
            .into_iter()
            .filter(|(k, _)| crate::key_in_range(k, start, end))
            .collect()
    }

    fn prefix_search(&self, prefix: &str) -> Vec<(String, Entry)> {
        match self.node(prefix) {
            Some(node) => Self::walk(node, prefix.to_string()),
            None => Vec::new(),
        }
    }
}
