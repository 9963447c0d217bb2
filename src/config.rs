//! File-based configuration for an acquisition job.
//!
//! Every section is optional; the defaults reproduce the tutorial run
//! (`xpptut13`, run 1, batches of 5, queue `psana`).
//!
//! ```toml
//! [source]
//! experiment = "xpptut13"
//! run = 1
//! dir = "/data/.tmp"
//!
//! [smalldata]
//! path = "my.jsonl"
//! batch_size = 5
//!
//! [queue]
//! endpoint = "tcp://127.0.0.1:8786"
//! name = "psana"
//!
//! [pipeline]
//! operation_timeout = 30
//! demand_batch_size = 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::{Error, Result};
use crate::pipeline::PipelineConfig;
use crate::queue::QueueConfig;
use crate::run::{data_dir_from_env, DataSourceConfig, DATA_DIR_ENV};
use crate::smalldata::SmallDataConfig;

/// Which run to read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub experiment: String,
    pub run: u32,
    /// Data directory; `None` resolves through `TEST_XTC_DIR`
    pub dir: Option<PathBuf>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            experiment: "xpptut13".to_string(),
            run: 1,
            dir: None,
        }
    }
}

/// Everything a job needs, grouped by component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaqConfig {
    pub source: SourceSettings,
    pub smalldata: SmallDataConfig,
    pub queue: QueueConfig,
    pub pipeline: PipelineConfig,
}

impl DaqConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::configuration(format!("invalid config: {}", e)))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::configuration(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Fill in the data directory from the environment when the file left it out
    pub fn apply_env(mut self) -> Result<Self> {
        if self.source.dir.is_none() {
            let dir = data_dir_from_env()?;
            tracing::debug!(env = DATA_DIR_ENV, dir = %dir.display(), "resolved data directory");
            self.source.dir = Some(dir);
        }
        Ok(self)
    }

    /// Data source settings; the directory must have been resolved
    pub fn data_source(&self) -> Result<DataSourceConfig> {
        let dir = self.source.dir.clone().ok_or_else(|| {
            Error::configuration("no data directory configured, call apply_env first")
        })?;
        Ok(DataSourceConfig::new(
            self.source.experiment.clone(),
            self.source.run,
            dir,
        ))
    }
}
