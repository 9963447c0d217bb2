//! Opening recorded experiment runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::{Error, Result};
use crate::run::detector::{Detector, DetectorInfo};
use crate::run::event::Event;
use crate::sources::EventSource;

/// Name of the metadata file inside an experiment directory
pub const METADATA_FILE: &str = "experiment.json";

/// Environment variable overriding the base directory for test data
pub const DATA_DIR_ENV: &str = "TEST_XTC_DIR";

/// Per-event predicate; events for which it returns false are skipped.
pub type EventFilter = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Experiment metadata stored next to the run files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentMetadata {
    pub experiment: String,
    #[serde(default)]
    pub runs: Vec<u32>,
    #[serde(default)]
    pub detectors: BTreeMap<String, DetectorInfo>,
}

/// Location of the run file for `run` inside an experiment directory
pub fn run_file(experiment_dir: &Path, run: u32) -> PathBuf {
    experiment_dir.join(format!("r{:04}.jsonl", run))
}

/// `<base>/.tmp`, where base is `TEST_XTC_DIR` or the current directory
pub fn data_dir_from_env() -> Result<PathBuf> {
    let base = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    Ok(base.join(".tmp"))
}

/// What to open: an experiment, a run number and the data directory.
#[derive(Clone)]
pub struct DataSourceConfig {
    pub experiment: String,
    pub run: u32,
    pub dir: PathBuf,
    pub filter: Option<EventFilter>,
}

impl DataSourceConfig {
    pub fn new(experiment: impl Into<String>, run: u32, dir: impl Into<PathBuf>) -> Self {
        Self {
            experiment: experiment.into(),
            run,
            dir: dir.into(),
            filter: None,
        }
    }

    /// Skip events for which `filter` returns false
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for DataSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceConfig")
            .field("experiment", &self.experiment)
            .field("run", &self.run)
            .field("dir", &self.dir)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// An opened experiment with the runs selected by its configuration.
#[derive(Debug)]
pub struct DataSource {
    metadata: Arc<ExperimentMetadata>,
    runs: Vec<Run>,
}

impl DataSource {
    /// Resolve the experiment metadata and the requested run.
    ///
    /// Fails with a configuration error if the directory, the metadata or the
    /// run file is missing, or if the metadata does not list the run.
    pub async fn open(config: DataSourceConfig) -> Result<Self> {
        if !tokio::fs::metadata(&config.dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(Error::configuration(format!(
                "data directory {} does not exist",
                config.dir.display()
            )));
        }

        let experiment_dir = config.dir.join(&config.experiment);
        let metadata_path = experiment_dir.join(METADATA_FILE);
        let raw = tokio::fs::read_to_string(&metadata_path)
            .await
            .map_err(|e| {
                Error::configuration(format!(
                    "experiment {} has no metadata at {}: {}",
                    config.experiment,
                    metadata_path.display(),
                    e
                ))
            })?;
        let metadata: ExperimentMetadata = serde_json::from_str(&raw).map_err(|e| {
            Error::configuration(format!(
                "invalid metadata {}: {}",
                metadata_path.display(),
                e
            ))
        })?;

        if metadata.experiment != config.experiment {
            return Err(Error::configuration(format!(
                "metadata at {} describes experiment {}, not {}",
                metadata_path.display(),
                metadata.experiment,
                config.experiment
            )));
        }

        if !metadata.runs.contains(&config.run) {
            return Err(Error::configuration(format!(
                "experiment {} has no run {}",
                config.experiment, config.run
            )));
        }

        let path = run_file(&experiment_dir, config.run);
        if tokio::fs::metadata(&path).await.is_err() {
            return Err(Error::configuration(format!(
                "run file {} is missing",
                path.display()
            )));
        }

        tracing::info!(
            experiment = %config.experiment,
            run = config.run,
            dir = %config.dir.display(),
            filtered = config.filter.is_some(),
            "opened data source"
        );

        let metadata = Arc::new(metadata);
        let run = Run {
            experiment: config.experiment,
            number: config.run,
            path,
            metadata: metadata.clone(),
            filter: config.filter,
        };

        Ok(Self {
            metadata,
            runs: vec![run],
        })
    }

    pub fn metadata(&self) -> &ExperimentMetadata {
        &self.metadata
    }

    /// The runs selected when the source was opened
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.runs.iter()
    }
}

/// One recorded run of an experiment.
#[derive(Clone)]
pub struct Run {
    experiment: String,
    number: u32,
    path: PathBuf,
    metadata: Arc<ExperimentMetadata>,
    filter: Option<EventFilter>,
}

impl Run {
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// A fresh event stream starting at the first recorded event
    pub fn events(&self) -> EventSource {
        EventSource::new(self.path.clone(), self.filter.clone())
    }

    /// Look up a detector declared in the experiment metadata
    pub fn detector(&self, name: &str) -> Result<Detector> {
        self.metadata
            .detectors
            .get(name)
            .map(|info| Detector::new(name, info.clone()))
            .ok_or_else(|| {
                Error::configuration(format!(
                    "experiment {} has no detector {}",
                    self.experiment, name
                ))
            })
    }
}

impl fmt::Debug for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Run")
            .field("experiment", &self.experiment)
            .field("number", &self.number)
            .field("path", &self.path)
            .finish()
    }
}
