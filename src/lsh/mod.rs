//! Bucketed random-projection LSH index.
//!
//! The index hashes every stored vector into `T` hash tables and answers
//! queries in two stages:
//!
//! 1. **Candidate retrieval**: the union over all tables of the records
//!    whose bucket key equals the query's key in that table. Only the exact
//!    bucket is probed; an empty union yields an empty result.
//! 2. **Exact re-ranking**: Euclidean distance from the query to every
//!    candidate, sorted ascending with ties broken by id.

pub mod bucket_map;
pub mod hyperplane;
pub mod neighbor;

pub use bucket_map::BucketMap;
pub use hyperplane::{BucketKey, HashTable, HyperplaneFamily, LshParams};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::distance::euclidean_distance;
use crate::error::{LshError, Result};
use crate::storage::VectorStore;

use self::bucket_map::build_bucket_maps;
use self::neighbor::{Neighbor, TopK};

/// How many candidates are scored between two cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// A search hit containing the vector ID and its exact distance to the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub distance: f32,
}

/// Ranked output of a query, ascending by distance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub hits: Vec<SearchResult>,
    /// Size of the candidate set before re-ranking.
    pub candidates: usize,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().map(|h| h.id.as_str())
    }
}

/// Cooperative cancellation flag shared between a caller and running queries.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-query knobs beyond the query vector itself.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions<'a> {
    pub k: usize,
    /// Drop this id from the candidates before ranking.
    pub exclude_id: Option<&'a str>,
    pub cancel: Option<&'a CancellationToken>,
}

impl<'a> QueryOptions<'a> {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            exclude_id: None,
            cancel: None,
        }
    }

    pub fn excluding(mut self, id: &'a str) -> Self {
        self.exclude_id = Some(id);
        self
    }

    pub fn with_cancel(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Bucket statistics of one hash table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableStats {
    pub buckets: usize,
    pub largest_bucket: usize,
    pub mean_bucket: f64,
}

/// Summary of a built index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub records: usize,
    pub dimension: usize,
    pub bucket_length: f32,
    pub num_hyperplanes: usize,
    pub tables: Vec<TableStats>,
}

#[derive(Debug)]
struct BuiltTables {
    buckets: Vec<BucketMap>,
    generation: u64,
    records: usize,
}

/// An LSH index over a [`VectorStore`].
///
/// The index owns its [`HyperplaneFamily`] and the derived bucket maps; the
/// vectors themselves stay in the store, which must be passed to every
/// query. Once built the index is read-only and can be shared across
/// threads.
#[derive(Debug)]
pub struct LshIndex {
    family: HyperplaneFamily,
    built: Option<BuiltTables>,
}

impl LshIndex {
    /// Create an index that has not been built yet.
    pub fn new(family: HyperplaneFamily) -> Self {
        Self {
            family,
            built: None,
        }
    }

    /// Create and build an index in one step.
    pub fn build(store: &VectorStore, family: HyperplaneFamily) -> Result<Self> {
        let mut index = Self::new(family);
        index.rebuild(store)?;
        Ok(index)
    }

    /// Rehash the whole store, keeping the current hyperplane family.
    pub fn rebuild(&mut self, store: &VectorStore) -> Result<()> {
        if let Some(dim) = store.dimension() {
            if dim != self.family.dimension() {
                return Err(LshError::DimensionMismatch {
                    expected: self.family.dimension(),
                    actual: dim,
                });
            }
        }

        let start = Instant::now();
        let buckets = build_bucket_maps(&self.family, store.records());
        self.built = Some(BuiltTables {
            buckets,
            generation: store.generation(),
            records: store.len(),
        });

        if let Ok(stats) = self.stats() {
            info!(
                records = stats.records,
                tables = stats.tables.len(),
                hyperplanes = stats.num_hyperplanes,
                bucket_length = stats.bucket_length,
                buckets = ?stats.tables.iter().map(|t| t.buckets).collect::<Vec<_>>(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "built LSH index"
            );
        }
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    pub fn family(&self) -> &HyperplaneFamily {
        &self.family
    }

    /// Bucket maps in table order.
    pub fn bucket_maps(&self) -> Result<&[BucketMap]> {
        Ok(&self.built()?.buckets)
    }

    fn built(&self) -> Result<&BuiltTables> {
        self.built.as_ref().ok_or(LshError::NotBuilt)
    }

    /// Fail unless the index was built against the store's current generation.
    pub fn ensure_fresh(&self, store: &VectorStore) -> Result<()> {
        let built = self.built()?;
        if built.generation != store.generation() {
            return Err(LshError::StaleIndex {
                built: built.generation,
                current: store.generation(),
            });
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let built = self.built()?;
        let tables = built
            .buckets
            .iter()
            .map(|map| {
                let buckets = map.num_buckets();
                TableStats {
                    buckets,
                    largest_bucket: map.largest_bucket(),
                    mean_bucket: if buckets == 0 {
                        0.0
                    } else {
                        built.records as f64 / buckets as f64
                    },
                }
            })
            .collect();

        Ok(IndexStats {
            records: built.records,
            dimension: self.family.dimension(),
            bucket_length: self.family.bucket_length(),
            num_hyperplanes: self.family.num_hyperplanes(),
            tables,
        })
    }

    /// Slots of every record sharing a bucket with `query` in at least one
    /// table, ascending and without duplicates.
    pub fn candidates(&self, store: &VectorStore, query: &[f32]) -> Result<Vec<usize>> {
        let built = self.built()?;
        self.ensure_fresh(store)?;
        if let Some(pos) = query.iter().position(|x| !x.is_finite()) {
            return Err(LshError::InvalidVector {
                reason: format!("Query component {} is not finite", pos),
            });
        }
        let keys = self.family.hash(query)?;

        let mut slots: Vec<usize> = keys
            .iter()
            .zip(&built.buckets)
            .flat_map(|(key, map)| map.get(key).iter().copied())
            .collect();
        slots.sort_unstable();
        slots.dedup();
        Ok(slots)
    }

    /// Approximate `k` nearest neighbors of `query`.
    pub fn query(&self, store: &VectorStore, query: &[f32], k: usize) -> Result<QueryResult> {
        self.query_with(store, query, QueryOptions::new(k))
    }

    /// Like [`LshIndex::query`], polling `token` while scoring candidates.
    pub fn query_with_cancel(
        &self,
        store: &VectorStore,
        query: &[f32],
        k: usize,
        token: &CancellationToken,
    ) -> Result<QueryResult> {
        self.query_with(store, query, QueryOptions::new(k).with_cancel(token))
    }

    pub fn query_with(
        &self,
        store: &VectorStore,
        query: &[f32],
        options: QueryOptions<'_>,
    ) -> Result<QueryResult> {
        let candidates = self.candidates(store, query)?;
        if candidates.is_empty() {
            debug!("no candidate shares a bucket with the query");
            return Ok(QueryResult::default());
        }

        let mut top = TopK::new(options.k);
        for (i, &slot) in candidates.iter().enumerate() {
            if i % CANCEL_CHECK_INTERVAL == 0 {
                if let Some(token) = options.cancel {
                    if token.is_cancelled() {
                        return Err(LshError::Cancelled);
                    }
                }
            }

            let Some(record) = store.record(slot) else {
                continue;
            };
            if options.exclude_id == Some(record.id.as_str()) {
                continue;
            }
            let distance = euclidean_distance(query, record.vector.as_slice());
            top.push(Neighbor::new(&record.id, distance));
        }

        let hits: Vec<SearchResult> = top
            .into_sorted_vec()
            .into_iter()
            .map(|n| SearchResult {
                id: n.id.to_string(),
                distance: n.distance,
            })
            .collect();

        debug!(
            candidates = candidates.len(),
            returned = hits.len(),
            k = options.k,
            "ranked candidates"
        );

        Ok(QueryResult {
            hits,
            candidates: candidates.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector;
    use approx::assert_relative_eq;

    fn scenario_store() -> VectorStore {
        let mut store = VectorStore::new();
        store.insert("A", Vector::new(vec![0.0, 0.0])).unwrap();
        store.insert("B", Vector::new(vec![1.0, 0.0])).unwrap();
        store.insert("C", Vector::new(vec![10.0, 10.0])).unwrap();
        store
    }

    fn scenario_family() -> HyperplaneFamily {
        HyperplaneFamily::from_directions(2.0, vec![vec![Vector::new(vec![1.0, 0.0])]]).unwrap()
    }

    #[test]
    fn test_scenario_buckets() {
        let store = scenario_store();
        let index = LshIndex::build(&store, scenario_family()).unwrap();

        let map = &index.bucket_maps().unwrap()[0];
        assert_eq!(map.get(&BucketKey::new(vec![0])), &[0, 1]);
        assert_eq!(map.get(&BucketKey::new(vec![5])), &[2]);
    }

    #[test]
    fn test_scenario_query() {
        let store = scenario_store();
        let index = LshIndex::build(&store, scenario_family()).unwrap();

        let result = index.query(&store, &[0.0, 0.0], 2).unwrap();
        assert_eq!(result.candidates, 2);
        assert_eq!(result.len(), 2);
        assert_eq!(result.hits[0].id, "A");
        assert_relative_eq!(result.hits[0].distance, 0.0);
        assert_eq!(result.hits[1].id, "B");
        assert_relative_eq!(result.hits[1].distance, 1.0);
    }

    #[test]
    fn test_k_larger_than_candidates() {
        let store = scenario_store();
        let index = LshIndex::build(&store, scenario_family()).unwrap();

        let result = index.query(&store, &[0.0, 0.0], 200).unwrap();
        assert_eq!(result.ids().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn test_empty_candidate_set() {
        let store = scenario_store();
        let index = LshIndex::build(&store, scenario_family()).unwrap();

        // Bucket -50 holds nothing, and no fallback scan happens
        let result = index.query(&store, &[-100.0, 0.0], 3).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.candidates, 0);
    }

    #[test]
    fn test_union_across_tables() {
        let store = scenario_store();
        let family = HyperplaneFamily::from_directions(
            2.0,
            vec![
                vec![Vector::new(vec![1.0, 0.0])],
                vec![Vector::new(vec![0.0, 1.0])],
            ],
        )
        .unwrap();
        let index = LshIndex::build(&store, family).unwrap();

        // Table 0 puts x = 10.5 in C's bucket, table 1 puts y = 0.5 in A and B's
        let candidates = index.candidates(&store, &[10.5, 0.5]).unwrap();
        assert_eq!(candidates, vec![0, 1, 2]);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let mut store = VectorStore::new();
        store.insert("c", Vector::new(vec![1.0, 0.0])).unwrap();
        store.insert("b", Vector::new(vec![1.0, 0.0])).unwrap();
        store.insert("a", Vector::new(vec![0.0, 1.0])).unwrap();
        let family =
            HyperplaneFamily::from_directions(100.0, vec![vec![Vector::new(vec![1.0, 1.0])]])
                .unwrap();
        let index = LshIndex::build(&store, family).unwrap();

        let result = index.query(&store, &[0.0, 0.0], 3).unwrap();
        assert_eq!(result.ids().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_exclude_id() {
        let store = scenario_store();
        let index = LshIndex::build(&store, scenario_family()).unwrap();

        let result = index
            .query_with(&store, &[0.0, 0.0], QueryOptions::new(1).excluding("A"))
            .unwrap();
        assert_eq!(result.ids().collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn test_query_before_build() {
        let store = scenario_store();
        let index = LshIndex::new(scenario_family());
        assert!(!index.is_built());
        assert!(matches!(
            index.query(&store, &[0.0, 0.0], 1),
            Err(LshError::NotBuilt)
        ));
        assert!(matches!(index.stats(), Err(LshError::NotBuilt)));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let store = scenario_store();
        let index = LshIndex::build(&store, scenario_family()).unwrap();
        assert!(matches!(
            index.query(&store, &[0.0, 0.0, 0.0], 1),
            Err(LshError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_query_rejects_non_finite() {
        let store = scenario_store();
        let index = LshIndex::build(&store, scenario_family()).unwrap();
        assert!(matches!(
            index.query(&store, &[f32::NAN, 0.0], 5),
            Err(LshError::InvalidVector { .. })
        ));
        assert!(matches!(
            index.candidates(&store, &[0.0, f32::INFINITY]),
            Err(LshError::InvalidVector { .. })
        ));
    }

    #[test]
    fn test_build_dimension_mismatch() {
        let store = scenario_store();
        let family = HyperplaneFamily::fit(3, &LshParams::default()).unwrap();
        assert!(matches!(
            LshIndex::build(&store, family),
            Err(LshError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_stale_index_and_rebuild() {
        let mut store = scenario_store();
        let mut index = LshIndex::build(&store, scenario_family()).unwrap();
        let family_before = index.family().clone();

        store.insert("D", Vector::new(vec![0.5, 3.0])).unwrap();
        assert!(matches!(
            index.query(&store, &[0.0, 0.0], 3),
            Err(LshError::StaleIndex { .. })
        ));

        index.rebuild(&store).unwrap();
        assert_eq!(index.family(), &family_before);
        let result = index.query(&store, &[0.0, 0.0], 3).unwrap();
        assert_eq!(result.ids().collect::<Vec<_>>(), vec!["A", "B", "D"]);
    }

    #[test]
    fn test_cancelled_query() {
        let store = scenario_store();
        let index = LshIndex::build(&store, scenario_family()).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        assert!(matches!(
            index.query_with_cancel(&store, &[0.0, 0.0], 2, &token),
            Err(LshError::Cancelled)
        ));
    }

    #[test]
    fn test_stats() {
        let store = scenario_store();
        let index = LshIndex::build(&store, scenario_family()).unwrap();
        let stats = index.stats().unwrap();

        assert_eq!(stats.records, 3);
        assert_eq!(stats.dimension, 2);
        assert_eq!(stats.tables.len(), 1);
        assert_eq!(stats.tables[0].buckets, 2);
        assert_eq!(stats.tables[0].largest_bucket, 2);
        assert_relative_eq!(stats.tables[0].mean_bucket, 1.5);
    }

    #[test]
    fn test_empty_store() {
        let store = VectorStore::new();
        let family = HyperplaneFamily::fit(4, &LshParams::default()).unwrap();
        let index = LshIndex::build(&store, family).unwrap();
        let result = index.query(&store, &[0.0; 4], 5).unwrap();
        assert!(result.is_empty());
    }
}
