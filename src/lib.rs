//! # LSH Retrieval
//!
//! Approximate nearest-neighbor retrieval over dense feature vectors using
//! bucketed random projection, with exact re-ranking of the candidates and
//! precision/recall evaluation against ground truth.
//!
//! This library provides:
//! - In-memory vector storage
//! - Seeded random hyperplane families and a multi-table LSH index
//! - A query runner with per-query error isolation
//! - Precision/recall scoring
//! - Loaders for descriptor and ground-truth files
//!
//! ## Example
//!
//! ```rust
//! use lsh_retrieval::{HyperplaneFamily, LshIndex, LshParams, Vector, VectorStore};
//!
//! let mut store = VectorStore::new();
//! store.insert("a", Vector::new(vec![0.0, 0.0])).unwrap();
//! store.insert("b", Vector::new(vec![0.5, 0.1])).unwrap();
//!
//! let family = HyperplaneFamily::fit(2, &LshParams::new(4.0, 1, 3, 42)).unwrap();
//! let index = LshIndex::build(&store, family).unwrap();
//!
//! let result = index.query(&store, &[0.0, 0.0], 5).unwrap();
//! assert_eq!(result.hits[0].id, "a");
//! ```

pub mod config;
pub mod distance;
pub mod error;
pub mod evaluation;
pub mod io;
pub mod lsh;
pub mod metrics;
pub mod runner;
pub mod storage;
pub mod vector;

pub use config::AppConfig;
pub use error::{LshError, Result};
pub use evaluation::{score, EvaluationSummary, GroundTruth, Score};
pub use lsh::{
    CancellationToken, HyperplaneFamily, IndexStats, LshIndex, LshParams, QueryOptions,
    QueryResult, SearchResult,
};
pub use metrics::MetricsCollector;
pub use runner::{QueryOutcome, QueryRunner, RunnerConfig};
pub use storage::{VectorRecord, VectorStore};
pub use vector::Vector;
