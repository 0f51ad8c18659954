//! Per-table bucket maps and their parallel construction.

use std::collections::HashMap;

use rayon::prelude::*;

use super::hyperplane::{BucketKey, HyperplaneFamily};
use crate::storage::VectorRecord;

/// Buckets of a single hash table: composite key -> record slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketMap {
    buckets: HashMap<BucketKey, Vec<usize>>,
}

impl BucketMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: BucketKey, slot: usize) {
        self.buckets.entry(key).or_default().push(slot);
    }

    /// Record slots sharing `key`; empty if the bucket does not exist.
    pub fn get(&self, key: &BucketKey) -> &[usize] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Move every entry of `other` into `self`.
    pub fn merge(&mut self, other: BucketMap) {
        for (key, mut slots) in other.buckets {
            self.buckets.entry(key).or_default().append(&mut slots);
        }
    }

    /// Sort bucket members so the map does not depend on merge order.
    fn finalize(&mut self) {
        for slots in self.buckets.values_mut() {
            slots.sort_unstable();
            slots.dedup();
        }
    }

    /// Number of non-empty buckets.
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Size of the most populated bucket.
    pub fn largest_bucket(&self) -> usize {
        self.buckets.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &[usize])> {
        self.buckets.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

/// Hash every record under every table of `family`.
///
/// Records are folded into per-worker bucket maps by rayon and the shards
/// are merged pairwise, so no locking is needed. The caller guarantees that
/// all records match the family's dimensionality.
pub(crate) fn build_bucket_maps(
    family: &HyperplaneFamily,
    records: &[VectorRecord],
) -> Vec<BucketMap> {
    let num_tables = family.num_tables();
    let bucket_length = family.bucket_length();

    let mut maps = records
        .par_iter()
        .enumerate()
        .fold(
            || vec![BucketMap::new(); num_tables],
            |mut maps, (slot, record)| {
                for (map, table) in maps.iter_mut().zip(family.tables()) {
                    map.insert(table.hash(record.vector.as_slice(), bucket_length), slot);
                }
                maps
            },
        )
        .reduce(
            || vec![BucketMap::new(); num_tables],
            |mut acc, shard| {
                for (map, other) in acc.iter_mut().zip(shard) {
                    map.merge(other);
                }
                acc
            },
        );

    for map in &mut maps {
        map.finalize();
    }
    maps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsh::hyperplane::LshParams;
    use crate::vector::Vector;

    fn key(codes: &[i64]) -> BucketKey {
        BucketKey::new(codes.to_vec())
    }

    #[test]
    fn test_insert_and_get() {
        let mut map = BucketMap::new();
        map.insert(key(&[0]), 0);
        map.insert(key(&[0]), 1);
        map.insert(key(&[5]), 2);

        assert_eq!(map.get(&key(&[0])), &[0, 1]);
        assert_eq!(map.get(&key(&[5])), &[2]);
        assert!(map.get(&key(&[1])).is_empty());
        assert_eq!(map.num_buckets(), 2);
        assert_eq!(map.largest_bucket(), 2);
    }

    #[test]
    fn test_composite_keys_do_not_collide() {
        let mut map = BucketMap::new();
        map.insert(key(&[1, 2]), 0);
        map.insert(key(&[2, 1]), 1);
        map.insert(key(&[12]), 2);

        assert_eq!(map.num_buckets(), 3);
        assert_eq!(map.get(&key(&[1, 2])), &[0]);
    }

    #[test]
    fn test_merge_and_finalize() {
        let mut a = BucketMap::new();
        a.insert(key(&[0]), 3);
        let mut b = BucketMap::new();
        b.insert(key(&[0]), 1);
        b.insert(key(&[7]), 2);

        a.merge(b);
        a.finalize();
        assert_eq!(a.get(&key(&[0])), &[1, 3]);
        assert_eq!(a.get(&key(&[7])), &[2]);
    }

    #[test]
    fn test_build_matches_sequential_hashing() {
        let family = HyperplaneFamily::fit(3, &LshParams::new(0.5, 2, 3, 11)).unwrap();
        let records: Vec<VectorRecord> = (0..200)
            .map(|i| {
                let x = i as f32 * 0.1;
                VectorRecord::new(format!("r{}", i), Vector::new(vec![x, -x, x * 0.5]))
            })
            .collect();

        let maps = build_bucket_maps(&family, &records);
        assert_eq!(maps.len(), 3);

        for (t, table) in family.tables().iter().enumerate() {
            let total: usize = maps[t].iter().map(|(_, slots)| slots.len()).sum();
            assert_eq!(total, records.len());
            for (slot, record) in records.iter().enumerate() {
                let k = table.hash(record.vector.as_slice(), family.bucket_length());
                assert!(maps[t].get(&k).contains(&slot));
            }
        }
    }

    #[test]
    fn test_build_empty() {
        let family = HyperplaneFamily::fit(3, &LshParams::default()).unwrap();
        let maps = build_bucket_maps(&family, &[]);
        assert_eq!(maps.len(), 3);
        assert!(maps.iter().all(|m| m.num_buckets() == 0));
    }
}
