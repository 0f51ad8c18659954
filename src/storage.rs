//! In-memory vector storage

use crate::error::{LshError, Result};
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// A stored vector together with its string ID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vector,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, vector: impl Into<Vector>) -> Self {
        Self {
            id: id.into(),
            vector: vector.into(),
        }
    }
}

/// In-memory corpus of `(id, vector)` records.
///
/// Records live in insertion order in dense slots; the LSH index refers to
/// records by slot. Re-inserting an existing ID replaces the vector in its
/// original slot (last write wins). Every mutation bumps the store
/// generation so an index built against an older snapshot can be detected.
#[derive(Debug, Default)]
pub struct VectorStore {
    records: Vec<VectorRecord>,
    /// String ID -> slot
    id_to_slot: HashMap<String, usize>,
    /// Enforced vector dimension
    dimension: Option<usize>,
    generation: u64,
}

impl VectorStore {
    /// Create a new empty vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already parsed records.
    pub fn from_records(records: impl IntoIterator<Item = VectorRecord>) -> Result<Self> {
        let mut store = Self::new();
        for record in records {
            let id = record.id.clone();
            if store.insert(record.id, record.vector)? {
                warn!(id = %id, "duplicate id, keeping the later vector");
            }
        }
        Ok(store)
    }

    /// Insert a vector with the given ID.
    ///
    /// Returns `true` if the ID was already present and its vector replaced.
    pub fn insert(&mut self, id: impl Into<String>, vector: Vector) -> Result<bool> {
        let id = id.into();
        vector.validate()?;
        let dim = vector.dimension();

        // Check dimension consistency
        if let Some(expected_dim) = self.dimension {
            if dim != expected_dim {
                return Err(LshError::DimensionMismatch {
                    expected: expected_dim,
                    actual: dim,
                });
            }
        } else {
            self.dimension = Some(dim);
        }

        self.generation += 1;

        if let Some(&slot) = self.id_to_slot.get(&id) {
            self.records[slot].vector = vector;
            return Ok(true);
        }

        let slot = self.records.len();
        self.id_to_slot.insert(id.clone(), slot);
        self.records.push(VectorRecord { id, vector });
        Ok(false)
    }

    /// Get a vector by ID
    pub fn get(&self, id: &str) -> Option<&Vector> {
        self.id_to_slot
            .get(id)
            .map(|&slot| &self.records[slot].vector)
    }

    /// Get the record stored in a slot
    pub fn record(&self, slot: usize) -> Option<&VectorRecord> {
        self.records.get(slot)
    }

    /// All records in slot order
    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    /// Whether the store holds the given ID
    pub fn contains(&self, id: &str) -> bool {
        self.id_to_slot.contains_key(id)
    }

    /// Get the number of vectors in the store
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get the dimension of vectors in this store (if any)
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Mutation counter, bumped on every successful insert.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// List all vector IDs in slot order
    pub fn list_ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut store = VectorStore::new();
        let v = Vector::new(vec![1.0, 2.0, 3.0]);
        assert!(!store.insert("v1", v.clone()).unwrap());

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("v1"), Some(&v));
        assert_eq!(store.get("missing"), None);
        assert_eq!(store.dimension(), Some(3));
    }

    #[test]
    fn test_dimension_consistency() {
        let mut store = VectorStore::new();
        store.insert("v1", Vector::new(vec![1.0, 2.0, 3.0])).unwrap();

        let result = store.insert("v2", Vector::new(vec![1.0, 2.0]));
        assert!(matches!(
            result,
            Err(LshError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_id_last_write_wins() {
        let mut store = VectorStore::new();
        store.insert("a", Vector::new(vec![1.0, 0.0])).unwrap();
        store.insert("b", Vector::new(vec![0.0, 1.0])).unwrap();
        let replaced = store.insert("a", Vector::new(vec![5.0, 5.0])).unwrap();

        assert!(replaced);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").unwrap().as_slice(), &[5.0, 5.0]);
        assert_eq!(store.record(0).unwrap().id, "a");
        assert_eq!(store.list_ids(), vec!["a", "b"]);
    }

    #[test]
    fn test_generation_tracks_mutations() {
        let mut store = VectorStore::new();
        assert_eq!(store.generation(), 0);
        store.insert("a", Vector::new(vec![1.0])).unwrap();
        store.insert("a", Vector::new(vec![2.0])).unwrap();
        assert_eq!(store.generation(), 2);

        // Rejected inserts leave the generation untouched
        let _ = store.insert("b", Vector::new(vec![1.0, 2.0]));
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut store = VectorStore::new();
        let result = store.insert("nan", Vector::new(vec![f32::NAN, 1.0]));
        assert!(matches!(result, Err(LshError::InvalidVector { .. })));
        assert!(store.is_empty());
        assert_eq!(store.dimension(), None);
    }

    #[test]
    fn test_from_records() {
        let store = VectorStore::from_records(vec![
            VectorRecord::new("a", Vector::new(vec![0.0, 0.0])),
            VectorRecord::new("b", Vector::new(vec![1.0, 0.0])),
        ])
        .unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.contains("b"));
    }

    #[test]
    fn test_from_records_with_duplicates() {
        let store = VectorStore::from_records(vec![
            VectorRecord::new("a", Vector::new(vec![0.0, 0.0])),
            VectorRecord::new("b", Vector::new(vec![1.0, 0.0])),
            VectorRecord::new("a", Vector::new(vec![2.0, 2.0])),
        ])
        .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").unwrap().as_slice(), &[2.0, 2.0]);
        assert_eq!(store.generation(), 3);
    }
}
