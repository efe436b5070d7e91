use super::*;


/// Runs `check` against a fresh memtable of every variant.
fn each_variant(max_size: usize, check: impl Fn(&mut dyn Memtable)) {
    for variant in MemtableVariant::ALL {
        let mut m = create(variant, max_size);
        assert_eq!(m.variant(), variant);
        check(m.as_mut());
    }
}

fn value(v: &str) -> Entry {
    Entry::Value(v.to_string())
}

fn keys(entries: &[(String, Entry)]) -> Vec<&str> {
    entries.iter().map(|(k, _)| k.as_str()).collect()
}

// -------------------- Basic CRUD --------------------

#[test]
fn put_and_get_single_key() {
    each_variant(1024, |m| {
        m.put("user:alice".into(), "Alice Smith".into());
        assert_eq!(m.entry_count(), 1);
        assert_eq!(m.get("user:alice"), Some(&value("Alice Smith")));
    });
}

#[test]
fn get_missing_key_returns_none() {
    each_variant(1024, |m| {
        m.put("a".into(), "1".into());
        assert_eq!(m.get("b"), None);
        assert_eq!(m.get(""), None);
    });
}

#[test]
fn overwrite_keeps_one_entry() {
    each_variant(1024, |m| {
        m.put("k".into(), "v1".into());
        m.put("k".into(), "v2".into());
        assert_eq!(m.entry_count(), 1);
        assert_eq!(m.get("k"), Some(&value("v2")));
    });
}

#[test]
fn delete_leaves_a_tombstone() {
    each_variant(1024, |m| {
        m.put("k".into(), "v".into());
        m.delete("k".into());
        assert_eq!(m.get("k"), Some(&Entry::Tombstone));
        assert_eq!(m.entry_count(), 1);
    });
}

#[test]
fn delete_of_unknown_key_still_records_tombstone() {
    each_variant(1024, |m| {
        m.delete("ghost".into());
        assert_eq!(m.get("ghost"), Some(&Entry::Tombstone));
    });
}

#[test]
fn put_after_delete_resurrects() {
    each_variant(1024, |m| {
        m.delete("k".into());
        m.put("k".into(), "back".into());
        assert_eq!(m.get("k"), Some(&value("back")));
    });
}

#[test]
fn empty_value_is_not_a_tombstone() {
    each_variant(1024, |m| {
        m.put("k".into(), String::new());
        let got = m.get("k").unwrap();
        assert!(!got.is_tombstone());
        assert_eq!(got.value(), Some(""));
    });
}

#[test]
fn empty_key_is_a_valid_key() {
    each_variant(1024, |m| {
        m.put(String::new(), "root".into());
        assert_eq!(m.get(""), Some(&value("root")));
    });
}

// -------------------- Size accounting --------------------

#[test]
fn size_counts_key_and_value_bytes() {
    each_variant(1024, |m| {
        m.put("abc".into(), "12345".into());
        assert_eq!(m.size_bytes(), 8);
        m.put("x".into(), "y".into());
        assert_eq!(m.size_bytes(), 10);
    });
}

#[test]
fn overwrite_adjusts_size_by_the_delta() {
    each_variant(1024, |m| {
        m.put("k".into(), "short".into());
        m.put("k".into(), "much longer value".into());
        assert_eq!(m.size_bytes(), 1 + 17);
        m.put("k".into(), "v".into());
        assert_eq!(m.size_bytes(), 2);
    });
}

#[test]
fn tombstone_counts_its_key_only() {
    each_variant(1024, |m| {
        m.put("key".into(), "value".into());
        m.delete("key".into());
        assert_eq!(m.size_bytes(), 3);
        m.delete("other".into());
        assert_eq!(m.size_bytes(), 8);
    });
}

#[test]
fn size_tracks_a_mixed_workload() {
    each_variant(usize::MAX, |m| {
        let mut expected = std::collections::HashMap::new();
        for i in 0..300u32 {
            let key = format!("key{}", i % 97);
            if i % 5 == 0 {
                m.delete(key.clone());
                expected.insert(key, None);
            } else {
                let v = "x".repeat((i % 13) as usize);
                m.put(key.clone(), v.clone());
                expected.insert(key, Some(v));
            }
        }
        let want: usize = expected
            .iter()
            .map(|(k, v)| k.len() + v.as_ref().map_or(0, String::len))
            .sum();
        assert_eq!(m.size_bytes(), want);
        assert_eq!(m.entry_count(), expected.len());
    });
}

// -------------------- Flush signal --------------------

#[test]
fn put_signals_flush_once_threshold_reached() {
    each_variant(10, |m| {
        assert!(!m.put("abc".into(), "def".into())); // 6 bytes
        assert!(!m.is_full());
        assert!(m.put("gh".into(), "ij".into())); // 10 bytes
        assert!(m.is_full());
    });
}

#[test]
fn delete_reports_the_same_signal() {
    each_variant(4, |m| {
        assert!(!m.delete("ab".into()));
        assert!(m.delete("cd".into()));
    });
}

#[test]
fn shrinking_overwrite_clears_the_signal() {
    each_variant(10, |m| {
        assert!(m.put("k".into(), "0123456789".into()));
        assert!(!m.put("k".into(), "0".into()));
    });
}

// -------------------- Clear --------------------

#[test]
fn clear_resets_everything() {
    each_variant(1024, |m| {
        for i in 0..20 {
            m.put(format!("k{}", i), "v".into());
        }
        m.delete("k3".into());
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.size_bytes(), 0);
        assert_eq!(m.get("k1"), None);
        assert!(m.entries().is_empty());
    });
}

#[test]
fn clear_then_reuse() {
    each_variant(1024, |m| {
        m.put("a".into(), "1".into());
        m.clear();
        m.put("b".into(), "2".into());
        assert_eq!(m.entry_count(), 1);
        assert_eq!(m.size_bytes(), 2);
        assert_eq!(m.get("a"), None);
    });
}

#[test]
fn very_long_key_survives_lookup_and_clear() {
    let key = "k".repeat(64 * 1024);
    each_variant(usize::MAX, |m| {
        m.put(key.clone(), "v".into());
        m.put(format!("{}x", key), "w".into());
        assert_eq!(m.get(&key), Some(&value("v")));
        assert_eq!(m.sorted_entries().len(), 2);
        if let Some(ordered) = m.as_ordered() {
            assert_eq!(ordered.prefix_search(&key).len(), 2);
        }
        m.clear();
        assert!(m.is_empty());
    });
}

// -------------------- Ordering --------------------

#[test]
fn sorted_entries_are_ascending_for_every_variant() {
    each_variant(usize::MAX, |m| {
        for k in ["delta", "alpha", "charlie", "bravo", "echo"] {
            m.put(k.into(), k.to_uppercase());
        }
        m.delete("charlie".into());
        let sorted = m.sorted_entries();
        assert_eq!(keys(&sorted), ["alpha", "bravo", "charlie", "delta", "echo"]);
        assert_eq!(sorted[2].1, Entry::Tombstone);
        assert_eq!(sorted[0].1, value("ALPHA"));
    });
}

#[test]
fn ordered_variants_expose_range_queries() {
    for variant in MemtableVariant::ALL {
        let m = create(variant, 1024);
        assert_eq!(m.as_ordered().is_some(), variant.is_ordered(), "{}", variant);
    }
}

fn ordered_fixture() -> Vec<Box<dyn Memtable>> {
    MemtableVariant::ALL
        .into_iter()
        .filter(|v| v.is_ordered())
        .map(|v| {
            let mut m = create(v, usize::MAX);
            for k in ["user:bob", "user:alice", "order:1", "user:carol", "order:2", "zeta"] {
                m.put(k.into(), format!("v-{}", k));
            }
            m.delete("user:carol".into());
            m
        })
        .collect()
}

#[test]
fn range_query_is_half_open() {
    for m in ordered_fixture() {
        let ordered = m.as_ordered().unwrap();
        let got = ordered.range_query("order:2", "user:bob");
        assert_eq!(keys(&got), ["order:2", "user:alice"], "{}", m.variant());
    }
}

#[test]
fn range_query_with_empty_end_is_unbounded() {
    for m in ordered_fixture() {
        let got = m.as_ordered().unwrap().range_query("user:b", "");
        assert_eq!(keys(&got), ["user:bob", "user:carol", "zeta"], "{}", m.variant());
        assert_eq!(got[1].1, Entry::Tombstone);
    }
}

#[test]
fn inverted_range_is_empty() {
    for m in ordered_fixture() {
        assert!(m.as_ordered().unwrap().range_query("z", "a").is_empty());
    }
}

#[test]
fn prefix_search_returns_matching_keys_in_order() {
    for m in ordered_fixture() {
        let ordered = m.as_ordered().unwrap();
        let got = ordered.prefix_search("user:");
        assert_eq!(keys(&got), ["user:alice", "user:bob", "user:carol"], "{}", m.variant());
        assert!(ordered.prefix_search("nope").is_empty());
        assert_eq!(ordered.prefix_search("").len(), 6);
    }
}

// -------------------- Variant specifics --------------------

#[test]
fn hash_linked_entries_keep_insertion_order() {
    let mut m = HashLinkedMemtable::new(1024);
    for k in ["c", "a", "b"] {
        m.put(k.into(), "v".into());
    }
    m.put("a".into(), "again".into());
    assert_eq!(keys(&m.entries()), ["c", "a", "b"]);
}

#[test]
fn trie_handles_multibyte_keys_in_byte_order() {
    let mut m = TrieMemtable::new(1024);
    for k in ["é", "e", "z", "ée"] {
        m.put(k.into(), "v".into());
    }
    let mut expected = vec!["e", "z", "é", "ée"];
    expected.sort();
    assert_eq!(keys(&m.entries()), expected);
    assert_eq!(m.size_bytes(), "é".len() + "e".len() + "z".len() + "ée".len() + 4);
}

#[test]
fn key_in_range_bounds() {
    assert!(key_in_range("b", "a", "c"));
    assert!(key_in_range("a", "a", "c"));
    assert!(!key_in_range("c", "a", "c"));
    assert!(key_in_range("zzz", "a", ""));
    assert!(!key_in_range("0", "a", ""));
}
