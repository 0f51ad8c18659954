//! Query metrics: latency, failures and candidate-set sizes.

use std::time::Duration;

/// Collects runtime metrics for a query run.
#[derive(Debug)]
pub struct MetricsCollector {
    query_latencies_us: Vec<f64>,
    total_queries: u64,
    failed_queries: u64,
    empty_results: u64,
    total_candidates: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            query_latencies_us: Vec::new(),
            total_queries: 0,
            failed_queries: 0,
            empty_results: 0,
            total_candidates: 0,
        }
    }

    /// Record a successful query with its duration, number of returned hits
    /// and candidate-set size.
    pub fn record_query(&mut self, duration: Duration, hits: usize, candidates: usize) {
        self.total_queries += 1;
        self.total_candidates += candidates as u64;
        if hits == 0 {
            self.empty_results += 1;
        }
        self.query_latencies_us.push(duration.as_micros() as f64);
    }

    /// Record a query that returned an error.
    pub fn record_failure(&mut self) {
        self.total_queries += 1;
        self.failed_queries += 1;
    }

    pub fn total_queries(&self) -> u64 {
        self.total_queries
    }

    pub fn failed_queries(&self) -> u64 {
        self.failed_queries
    }

    /// Successful queries that returned no hits.
    pub fn empty_results(&self) -> u64 {
        self.empty_results
    }

    /// Mean candidate-set size over successful queries.
    pub fn avg_candidates(&self) -> f64 {
        let ok = self.query_latencies_us.len();
        if ok == 0 {
            return 0.0;
        }
        self.total_candidates as f64 / ok as f64
    }

    /// Average query latency in microseconds.
    pub fn avg_query_latency_us(&self) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.query_latencies_us.iter().sum();
        sum / self.query_latencies_us.len() as f64
    }

    /// Get a percentile of query latency (e.g., 50.0, 95.0, 99.0).
    pub fn percentile_query_latency_us(&self, percentile: f64) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }

        let mut sorted = self.query_latencies_us.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let index = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
