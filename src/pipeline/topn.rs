//! Deterministic top-N ranking.
//!
//! Entries are ordered by count descending, then by key ascending. The
//! result depends only on the multiset of keys, never on arrival order or
//! hash-map iteration order.

use serde::Serialize;
use std::collections::HashMap;

/// One ranked key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopEntry {
    pub key:   String,
    pub count: u64,
}

impl TopEntry {
    pub fn new(key: impl Into<String>, count: u64) -> Self {
        Self { key: key.into(), count }
    }
}

/// Counts occurrences of each key.
pub fn group<'a, I>(keys: I) -> HashMap<&'a str, u64>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = HashMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0u64) += 1;
    }
    counts
}

/// Every `(key, count)` pair in rank order.
pub fn rank<K: AsRef<str>>(counts: &HashMap<K, u64>) -> Vec<TopEntry> {
    let mut entries: Vec<TopEntry> = counts
        .iter()
        .map(|(k, c)| TopEntry::new(k.as_ref(), *c))
        .collect();
    entries.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    entries
}

/// The `n` highest-ranked entries; all of them if fewer than `n` keys exist.
pub fn top_n<K: AsRef<str>>(counts: &HashMap<K, u64>, n: usize) -> Vec<TopEntry> {
    let mut entries = rank(counts);
    entries.truncate(n);
    entries
}
