//! Query orchestration: look up a stored vector, query the index, score it.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{LshError, Result};
use crate::evaluation::{self, GroundTruth, Score};
use crate::lsh::{LshIndex, QueryOptions, QueryResult};
use crate::metrics::MetricsCollector;
use crate::storage::VectorStore;

/// Query-time configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Number of neighbors to return per query.
    pub k: usize,
    /// Remove the query's own id from its result.
    pub exclude_self: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            k: 200,
            exclude_self: false,
        }
    }
}

/// A scored query result.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluated {
    pub result: QueryResult,
    pub score: Score,
}

/// Outcome of one query in a batch. Failures stay attached to their query.
#[derive(Debug)]
pub struct QueryOutcome {
    pub query: String,
    pub outcome: Result<Evaluated>,
}

/// Runs queries by stored id against a built index.
#[derive(Debug)]
pub struct QueryRunner<'a> {
    store: &'a VectorStore,
    index: &'a LshIndex,
    config: RunnerConfig,
    metrics: RwLock<MetricsCollector>,
}

impl<'a> QueryRunner<'a> {
    /// Create a runner, failing fast if the index is unbuilt or stale.
    pub fn new(store: &'a VectorStore, index: &'a LshIndex, config: RunnerConfig) -> Result<Self> {
        index.ensure_fresh(store)?;
        Ok(Self {
            store,
            index,
            config,
            metrics: RwLock::new(MetricsCollector::new()),
        })
    }

    /// Approximate neighbors of the stored vector with the given id.
    pub fn run_query(&self, id: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let result = self.query_stored(id);
        self.record(start.elapsed(), result.as_ref());
        result
    }

    /// Count one query in the metrics. Failures at any stage, including
    /// scoring, count as failed queries.
    fn record(
        &self,
        elapsed: Duration,
        outcome: std::result::Result<&QueryResult, &LshError>,
    ) {
        if let Ok(mut metrics) = self.metrics.write() {
            match outcome {
                Ok(r) => metrics.record_query(elapsed, r.len(), r.candidates),
                Err(_) => metrics.record_failure(),
            }
        }
    }

    fn query_stored(&self, id: &str) -> Result<QueryResult> {
        let vector = self.store.get(id).ok_or_else(|| LshError::UnknownId {
            id: id.to_string(),
        })?;

        let mut options = QueryOptions::new(self.config.k);
        if self.config.exclude_self {
            options = options.excluding(id);
        }

        let result = self.index.query_with(self.store, vector.as_slice(), options)?;
        debug!(query = id, hits = result.len(), candidates = result.candidates, "query done");
        Ok(result)
    }

    /// Run and score one query.
    pub fn evaluate(&self, id: &str, ground_truth: &GroundTruth) -> Result<Evaluated> {
        let start = Instant::now();
        let queried = self.query_stored(id);
        let elapsed = start.elapsed();

        let outcome = queried.and_then(|result| {
            let score = evaluation::score(id, &result, ground_truth)?;
            Ok(Evaluated { result, score })
        });
        self.record(elapsed, outcome.as_ref().map(|e| &e.result));
        outcome
    }

    /// Run every query in parallel and score it against the ground truth
    /// returned by `ground_truth_for`.
    ///
    /// A failing query (unknown id, empty result, unreadable ground truth)
    /// is reported in its outcome and does not stop the batch. Outcomes are
    /// returned in input order.
    pub fn run_batch<S, F>(&self, queries: &[S], ground_truth_for: F) -> Vec<QueryOutcome>
    where
        S: AsRef<str> + Sync,
        F: Fn(&str) -> Result<GroundTruth> + Sync,
    {
        queries
            .par_iter()
            .map(|query| {
                let query = query.as_ref();
                let start = Instant::now();
                let queried = self.query_stored(query);
                let elapsed = start.elapsed();

                let outcome = queried.and_then(|result| {
                    let ground_truth = ground_truth_for(query)?;
                    let score = evaluation::score(query, &result, &ground_truth)?;
                    Ok(Evaluated { result, score })
                });
                self.record(elapsed, outcome.as_ref().map(|e| &e.result));
                if let Err(e) = &outcome {
                    if e.is_per_query() {
                        warn!(query, error = %e, "query failed");
                    } else {
                        error!(query, error = %e, "query failed");
                    }
                }
                QueryOutcome {
                    query: query.to_string(),
                    outcome,
                }
            })
            .collect()
    }

    /// Inspect the metrics collected so far.
    pub fn with_metrics<T>(&self, f: impl FnOnce(&MetricsCollector) -> T) -> Option<T> {
        self.metrics.read().ok().map(|m| f(&*m))
    }
}
