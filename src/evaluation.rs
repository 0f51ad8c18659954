//! Retrieval quality: precision and recall against ground truth.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{LshError, Result};
use crate::lsh::QueryResult;

/// IDs considered relevant for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundTruth {
    relevant: HashSet<String>,
}

impl GroundTruth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.relevant.insert(id.into())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.relevant.contains(id)
    }

    pub fn len(&self) -> usize {
        self.relevant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relevant.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for GroundTruth {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            relevant: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Precision and recall of one query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Score {
    pub precision: f64,
    pub recall: f64,
}

/// Score a query result against its ground truth.
///
/// Retrieved ids are treated as a set. Both ratios are undefined for empty
/// denominators, which surface as [`LshError::EmptyResult`] and
/// [`LshError::EmptyGroundTruth`] instead of a NaN.
pub fn score(query: &str, result: &QueryResult, ground_truth: &GroundTruth) -> Result<Score> {
    let retrieved: HashSet<&str> = result.ids().collect();
    if retrieved.is_empty() {
        return Err(LshError::EmptyResult {
            query: query.to_string(),
        });
    }
    if ground_truth.is_empty() {
        return Err(LshError::EmptyGroundTruth {
            query: query.to_string(),
        });
    }

    let true_positives = retrieved
        .iter()
        .filter(|id| ground_truth.contains(id))
        .count();

    Ok(Score {
        precision: true_positives as f64 / retrieved.len() as f64,
        recall: true_positives as f64 / ground_truth.len() as f64,
    })
}

/// Aggregated scores over a batch of queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub n_queries: usize,
    pub mean_precision: f64,
    pub min_precision: f64,
    pub max_precision: f64,
    pub mean_recall: f64,
    pub min_recall: f64,
    pub max_recall: f64,
}

impl EvaluationSummary {
    /// Compute summary statistics from individual query scores.
    pub fn from_scores(scores: &[Score]) -> Self {
        let n = scores.len();
        if n == 0 {
            return Self {
                n_queries: 0,
                mean_precision: 0.0,
                min_precision: 0.0,
                max_precision: 0.0,
                mean_recall: 0.0,
                min_recall: 0.0,
                max_recall: 0.0,
            };
        }

        let precisions = scores.iter().map(|s| s.precision);
        let recalls = scores.iter().map(|s| s.recall);

        Self {
            n_queries: n,
            mean_precision: precisions.clone().sum::<f64>() / n as f64,
            min_precision: precisions.clone().fold(f64::INFINITY, f64::min),
            max_precision: precisions.fold(f64::NEG_INFINITY, f64::max),
            mean_recall: recalls.clone().sum::<f64>() / n as f64,
            min_recall: recalls.clone().fold(f64::INFINITY, f64::min),
            max_recall: recalls.fold(f64::NEG_INFINITY, f64::max),
        }
    }
}
