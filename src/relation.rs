//! A many-to-many relation with bidirectional indices
//!
//! Backs the room membership bookkeeping: connections relate to room
//! names, and both directions are queried during fan-out and cleanup.
//! The two indices are maintained in lockstep and empty sets are pruned,
//! so `keys_count`/`values_count` always reflect live participants only.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Bidirectional many-to-many relation between keys and values
#[derive(Debug, Clone)]
pub struct RelationalMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    values_by_key: HashMap<K, HashSet<V>>,
    keys_by_value: HashMap<V, HashSet<K>>,
}

impl<K, V> RelationalMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    /// Create an empty relation
    pub fn new() -> Self {
        Self {
            values_by_key: HashMap::new(),
            keys_by_value: HashMap::new(),
        }
    }

    /// Relate `k` and `v`. Returns `true` iff the pair was not already
    /// related.
    pub fn relate(&mut self, k: K, v: V) -> bool {
        let inserted = self
            .values_by_key
            .entry(k.clone())
            .or_default()
            .insert(v.clone());
        if inserted {
            self.keys_by_value.entry(v).or_default().insert(k);
        }
        inserted
    }

    /// Remove the relation between `k` and `v`. Returns `true` iff the
    /// pair was related.
    pub fn unrelate(&mut self, k: &K, v: &V) -> bool {
        let removed = match self.values_by_key.get_mut(k) {
            Some(values) => values.remove(v),
            None => false,
        };
        if removed {
            if self.values_by_key.get(k).is_some_and(|s| s.is_empty()) {
                self.values_by_key.remove(k);
            }
            if let Some(keys) = self.keys_by_value.get_mut(v) {
                keys.remove(k);
                if keys.is_empty() {
                    self.keys_by_value.remove(v);
                }
            }
        }
        removed
    }

    /// Remove every relation mentioning `k`
    pub fn drop_key(&mut self, k: &K) {
        if let Some(values) = self.values_by_key.remove(k) {
            for v in values {
                if let Some(keys) = self.keys_by_value.get_mut(&v) {
                    keys.remove(k);
                    if keys.is_empty() {
                        self.keys_by_value.remove(&v);
                    }
                }
            }
        }
    }

    /// Remove every relation mentioning `v`
    pub fn drop_value(&mut self, v: &V) {
        if let Some(keys) = self.keys_by_value.remove(v) {
            for k in keys {
                if let Some(values) = self.values_by_key.get_mut(&k) {
                    values.remove(v);
                    if values.is_empty() {
                        self.values_by_key.remove(&k);
                    }
                }
            }
        }
    }

    /// Snapshot of the values related to `k`
    pub fn values_of(&self, k: &K) -> HashSet<V> {
        self.values_by_key.get(k).cloned().unwrap_or_default()
    }

    /// Snapshot of the keys related to `v`
    pub fn keys_of(&self, v: &V) -> HashSet<K> {
        self.keys_by_value.get(v).cloned().unwrap_or_default()
    }

    /// Whether `k` and `v` are related
    pub fn has(&self, k: &K, v: &V) -> bool {
        self.values_by_key
            .get(k)
            .is_some_and(|values| values.contains(v))
    }

    /// Whether `k` relates to at least one value
    pub fn has_key(&self, k: &K) -> bool {
        self.values_by_key.contains_key(k)
    }

    /// Whether `v` relates to at least one key
    pub fn has_value(&self, v: &V) -> bool {
        self.keys_by_value.contains_key(v)
    }

    /// Number of keys with at least one relation
    pub fn keys_count(&self) -> usize {
        self.values_by_key.len()
    }

    /// Number of values with at least one relation
    pub fn values_count(&self) -> usize {
        self.keys_by_value.len()
    }

    /// Iterate over the keys with at least one relation
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.values_by_key.keys()
    }

    /// Iterate over the values with at least one relation
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.keys_by_value.keys()
    }

    /// Drop every relation
    pub fn clear(&mut self) {
        self.values_by_key.clear();
        self.keys_by_value.clear();
    }
}

impl<K, V> Default for RelationalMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn relate_is_idempotent() {
        let mut map = RelationalMap::new();
        assert!(map.relate(1, "a"));
        assert!(!map.relate(1, "a"));
        assert_eq!(map.keys_count(), 1);
        assert_eq!(map.values_count(), 1);
    }

    #[test]
    fn unrelate_prunes_empty_sets() {
        let mut map = RelationalMap::new();
        map.relate(1, "a");
        map.relate(1, "b");
        assert!(map.unrelate(&1, &"a"));
        assert!(!map.unrelate(&1, &"a"));
        assert!(map.has_key(&1));
        assert!(!map.has_value(&"a"));
        assert!(map.unrelate(&1, &"b"));
        assert!(!map.has_key(&1));
        assert_eq!(map.keys_count(), 0);
        assert_eq!(map.values_count(), 0);
    }

    #[test]
    fn drop_key_removes_all_mentions() {
        let mut map = RelationalMap::new();
        map.relate(1, "a");
        map.relate(1, "b");
        map.relate(2, "b");
        map.drop_key(&1);
        assert!(!map.has_key(&1));
        assert!(!map.has_value(&"a"));
        assert_eq!(map.keys_of(&"b"), HashSet::from([2]));
    }

    #[test]
    fn drop_value_removes_all_mentions() {
        let mut map = RelationalMap::new();
        map.relate(1, "a");
        map.relate(2, "a");
        map.relate(2, "b");
        map.drop_value(&"a");
        assert!(!map.has_value(&"a"));
        assert!(!map.has_key(&1));
        assert_eq!(map.values_of(&2), HashSet::from(["b"]));
    }

    #[test]
    fn snapshots_do_not_alias_internal_state() {
        let mut map = RelationalMap::new();
        map.relate(1, "a");
        let mut snapshot = map.values_of(&1);
        snapshot.insert("b");
        assert!(!map.has(&1, &"b"));
    }

    #[test]
    fn relate_then_unrelate_restores_prior_state() {
        let mut map = RelationalMap::new();
        map.relate(1, "a");
        let before = map.clone();
        map.relate(2, "b");
        map.unrelate(&2, &"b");
        assert_eq!(map.keys_count(), before.keys_count());
        assert_eq!(map.values_count(), before.values_count());
        assert_eq!(map.values_of(&1), before.values_of(&1));
        assert!(!map.has_key(&2));
    }

    /// One step of a randomly generated operation sequence
    #[derive(Debug, Clone)]
    enum Op {
        Relate(u8, u8),
        Unrelate(u8, u8),
        DropKey(u8),
        DropValue(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8, 0u8..8).prop_map(|(k, v)| Op::Relate(k, v)),
            (0u8..8, 0u8..8).prop_map(|(k, v)| Op::Unrelate(k, v)),
            (0u8..8).prop_map(Op::DropKey),
            (0u8..8).prop_map(Op::DropValue),
        ]
    }

    fn check_invariants(map: &RelationalMap<u8, u8>) {
        for k in map.keys() {
            let values = map.values_of(k);
            assert!(!values.is_empty(), "retained key with empty value set");
            for v in &values {
                assert!(map.keys_of(v).contains(k), "indices disagree");
            }
        }
        for v in map.values() {
            let keys = map.keys_of(v);
            assert!(!keys.is_empty(), "retained value with empty key set");
            for k in &keys {
                assert!(map.values_of(k).contains(v), "indices disagree");
            }
        }
    }

    proptest! {
        #[test]
        fn indices_agree_after_any_op_sequence(ops in proptest::collection::vec(op_strategy(), 0..64)) {
            let mut map = RelationalMap::new();
            for op in ops {
                match op {
                    Op::Relate(k, v) => { map.relate(k, v); }
                    Op::Unrelate(k, v) => { map.unrelate(&k, &v); }
                    Op::DropKey(k) => map.drop_key(&k),
                    Op::DropValue(v) => map.drop_value(&v),
                }
                check_invariants(&map);
            }
        }
    }
}
