//! Writing runs in the on-disk layout read by [`DataSource`](crate::run::DataSource).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::core::{json, Result, Sink};
use crate::run::datasource::{run_file, ExperimentMetadata, METADATA_FILE};
use crate::run::detector::DetectorInfo;
use crate::run::event::Event;

/// Records runs for one experiment and writes its metadata on `finish`.
pub struct RunRecorder {
    experiment_dir: PathBuf,
    metadata: ExperimentMetadata,
}

impl RunRecorder {
    /// Create `<dir>/<experiment>` if needed
    pub async fn new(dir: impl AsRef<Path>, experiment: impl Into<String>) -> Result<Self> {
        let experiment = experiment.into();
        let experiment_dir = dir.as_ref().join(&experiment);
        tokio::fs::create_dir_all(&experiment_dir).await?;

        Ok(Self {
            experiment_dir,
            metadata: ExperimentMetadata {
                experiment,
                ..Default::default()
            },
        })
    }

    /// Declare a detector in the experiment metadata
    pub fn detector(mut self, name: impl Into<String>, info: DetectorInfo) -> Self {
        self.metadata.detectors.insert(name.into(), info);
        self
    }

    /// Start a run file, truncating any previous recording of the same run
    pub async fn begin_run(&mut self, run: u32) -> Result<RunWriter> {
        let path = run_file(&self.experiment_dir, run);
        let file = tokio::fs::File::create(&path).await?;
        if !self.metadata.runs.contains(&run) {
            self.metadata.runs.push(run);
        }

        Ok(RunWriter {
            writer: tokio::io::BufWriter::new(file),
            path,
            written: 0,
        })
    }

    /// Write the experiment metadata
    pub async fn finish(mut self) -> Result<ExperimentMetadata> {
        self.metadata.runs.sort_unstable();
        json::ensure_finite(&self.metadata)?;
        let raw = serde_json::to_vec_pretty(&self.metadata)?;
        tokio::fs::write(self.experiment_dir.join(METADATA_FILE), raw).await?;
        Ok(self.metadata)
    }
}

/// Appends events to one run file, one JSON document per line.
pub struct RunWriter {
    writer: tokio::io::BufWriter<tokio::fs::File>,
    path: PathBuf,
    written: u64,
}

impl RunWriter {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of events written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and close the run file
    pub async fn close(mut self) -> Result<u64> {
        self.writer.flush().await?;
        Ok(self.written)
    }
}

#[async_trait]
impl Sink for RunWriter {
    type Item = Event;

    /// Encodes the whole batch before writing, so a batch holding a non-finite
    /// readout fails with a serialization error and leaves the file untouched.
    async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()> {
        let lines = items
            .iter()
            .map(json::to_line)
            .collect::<Result<Vec<_>>>()?;
        for line in lines {
            self.writer.write_all(&line).await?;
            self.written += 1;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}
