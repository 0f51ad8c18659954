//! Application configuration: data locations, query list and index parameters.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LshError, Result};
use crate::io::ground_truth_path;
use crate::lsh::LshParams;
use crate::runner::RunnerConfig;

/// Everything an evaluation run needs, loadable from a JSON file.
///
/// Missing fields take their defaults, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Descriptor file, one `<id> <d_1> ... <d_D>` record per line.
    pub descriptors: PathBuf,
    /// Directory holding `<query>.txt` ground-truth files.
    pub ground_truth_dir: PathBuf,
    /// Query names evaluated by `evaluate`.
    pub queries: Vec<String>,
    /// Appended to a query name to form its record id.
    pub id_suffix: String,
    /// Result rows printed per query.
    pub display_rows: usize,
    pub runner: RunnerConfig,
    pub lsh: LshParams,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            descriptors: PathBuf::from(".databases/descriptors/RESNETDescriptors.txt"),
            ground_truth_dir: PathBuf::from(".databases/ground_truth"),
            queries: vec!["181081".to_string(), "415008".to_string()],
            id_suffix: ".jpg".to_string(),
            display_rows: 10,
            runner: RunnerConfig::default(),
            lsh: LshParams::default(),
        }
    }
}

impl AppConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| LshError::SerializationError(e.to_string()))
    }

    /// Record id of a query name: `181081` becomes `181081.jpg`.
    pub fn record_id(&self, query: &str) -> String {
        if query.ends_with(&self.id_suffix) {
            query.to_string()
        } else {
            format!("{}{}", query, self.id_suffix)
        }
    }

    /// Ground-truth file of a query name or record id.
    pub fn ground_truth_file(&self, query: &str) -> PathBuf {
        let name = query.strip_suffix(self.id_suffix.as_str()).unwrap_or(query);
        ground_truth_path(&self.ground_truth_dir, name)
    }
}
