//! Partial results and the MERGE step

use std::collections::BTreeMap;

/// Records produced by one worker over its queue drain
///
/// With the default flush mode a worker publishes exactly one of these
/// when its supply runs out. With per-item flush it publishes one per item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialResult<R> {
    /// Worker that produced the records
    pub worker_id: usize,

    /// Records in the order the worker processed its items
    pub records: Vec<R>,

    /// Items consumed to produce this batch
    pub items: usize,
}

impl<R> PartialResult<R> {
    pub fn new(worker_id: usize, records: Vec<R>, items: usize) -> Self {
        Self {
            worker_id,
            records,
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Concatenate partial results in arrival order
pub fn merge_partials<R>(partials: Vec<PartialResult<R>>) -> Vec<R> {
    let total = partials.iter().map(PartialResult::len).sum();
    let mut merged = Vec::with_capacity(total);
    for partial in partials {
        merged.extend(partial.records);
    }
    merged
}

/// Group an ordered sequence by key, keeping input order within each group
pub fn group_by_key<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> BTreeMap<K, Vec<T>>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut groups: BTreeMap<K, Vec<T>> = BTreeMap::new();
    for item in items {
        groups.entry(key(&item)).or_default().push(item);
    }
    groups
}
