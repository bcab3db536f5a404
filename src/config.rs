use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::DEFAULT_DATABASE;
use crate::tfidf::DEFAULT_NUM_FEATURES;

/// Everything a pipeline run needs. Passed to [`crate::Pipeline::new`]; there is
/// no process-wide configuration.
///
/// Missing fields take their defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Text file (one record per line) or a directory of such files.
    pub corpus: PathBuf,
    /// Document-store URI (`mem://` or `file://<dir>`). Without it nothing is
    /// persisted or queried.
    pub store_uri: Option<String>,
    /// Folder for the per-file/global fan-out. Needs `store_uri` as well.
    pub folder: Option<PathBuf>,
    pub database: String,
    /// Minimum word length for the stored-words query.
    pub min_length: usize,
    /// Count threshold for the frequency-share filter.
    pub min_count: u64,
    /// Size of the before/after stopword rankings.
    pub top_n: usize,
    pub longest_n: usize,
    pub bigram_top_k: usize,
    /// TF-IDF hash buckets.
    pub num_features: usize,
    pub tfidf_sample_rows: usize,
    /// Partitions per dataset handed to the compute engine.
    pub partitions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            corpus: PathBuf::from("sample_corpus.txt"),
            store_uri: None,
            folder: None,
            database: DEFAULT_DATABASE.to_string(),
            min_length: 7,
            min_count: 2,
            top_n: 10,
            longest_n: 10,
            bigram_top_k: 20,
            num_features: DEFAULT_NUM_FEATURES,
            tfidf_sample_rows: 5,
            partitions: rayon::current_num_threads(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_features == 0 {
            return Err(Error::InvalidConfig("num_features must be > 0".into()));
        }
        if self.partitions == 0 {
            return Err(Error::InvalidConfig("partitions must be > 0".into()));
        }
        if self.top_n == 0 {
            return Err(Error::InvalidConfig("top_n must be > 0".into()));
        }
        if self.database.trim().is_empty() {
            return Err(Error::InvalidConfig("database name is empty".into()));
        }
        Ok(())
    }

    /// Fan-out runs only with both a folder and a store.
    pub fn fan_out_enabled(&self) -> bool {
        self.folder.is_some() && self.store_uri.is_some()
    }
}
