//! Partitioning of text units by domain combination.

use std::collections::BTreeMap;

use canon_core::types::DomainKey;

/// Text units sharing one domain combination, and therefore one schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainGroup {
    pub key: DomainKey,
    /// Indices into the original unit batch, ascending.
    pub indices: Vec<usize>,
}

impl DomainGroup {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Groups units by identical [`DomainKey`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchGrouper;

impl BatchGrouper {
    /// Partition units by key. `keys[i]` is the key of unit `i`.
    ///
    /// Groups come back sorted by key, each holding ascending unit indices.
    pub fn group(keys: &[DomainKey]) -> Vec<DomainGroup> {
        let mut buckets: BTreeMap<&DomainKey, Vec<usize>> = BTreeMap::new();
        for (index, key) in keys.iter().enumerate() {
            buckets.entry(key).or_default().push(index);
        }

        buckets
            .into_iter()
            .map(|(key, indices)| DomainGroup {
                key: key.clone(),
                indices,
            })
            .collect()
    }

    /// Put per-group results back into input order.
    ///
    /// `results[g][j]` belongs to unit `groups[g].indices[j]`. Units without a
    /// result keep `T::default()`.
    pub fn scatter<T: Default + Clone>(
        groups: &[DomainGroup],
        results: Vec<Vec<T>>,
        total: usize,
    ) -> Vec<T> {
        let mut out = vec![T::default(); total];
        for (group, group_results) in groups.iter().zip(results) {
            for (&index, value) in group.indices.iter().zip(group_results) {
                if let Some(slot) = out.get_mut(index) {
                    *slot = value;
                }
            }
        }
        out
    }
}
