//! Pipeline orchestration and execution.
//!
//! A pipeline pulls batches from a source, runs them through a processor and
//! writes the outputs to a sink, all on the calling task. Items keep their
//! source order from end to end.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::core::{Error, Processor, Result, Sink, Source};

/// Configuration for pipeline execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum time to wait for the source or the processor
    #[serde(with = "duration_secs")]
    pub operation_timeout: Duration,
    /// Number of items requested from the source per pull
    pub demand_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(30),
            demand_batch_size: 100,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Counts reported when a pipeline completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Items pulled from the source
    pub items_in: u64,
    /// Items written to the sink
    pub items_out: u64,
}

/// A pipeline connects a source and a processor; `sink` runs it to completion.
pub struct Pipeline<P, R> {
    source: P,
    processor: R,
    config: PipelineConfig,
}

impl<P, R> Pipeline<P, R>
where
    P: Source + Send,
    R: Processor<Input = P::Item> + Send,
{
    /// Create a new pipeline
    pub fn new(source: P, processor: R) -> Self {
        Self {
            source,
            processor,
            config: PipelineConfig::default(),
        }
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the demand batch size
    pub fn demand_batch_size(mut self, size: usize) -> Self {
        self.config.demand_batch_size = size;
        self
    }

    /// Set the operation timeout
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout = timeout;
        self
    }

    /// Run the pipeline, writing every output to `sink`
    pub async fn sink<C>(self, mut sink: C) -> Result<PipelineStats>
    where
        C: Sink<Item = R::Output> + Send,
    {
        let Pipeline {
            mut source,
            mut processor,
            config,
        } = self;
        let demand = config.demand_batch_size.max(1);
        let limit = config.operation_timeout;
        let mut stats = PipelineStats::default();

        tracing::debug!(demand, timeout_ms = limit.as_millis() as u64, "pipeline started");

        loop {
            let items = with_timeout(limit, source.handle_demand(demand)).await?;

            if items.is_empty() {
                // Source exhausted, process any final outputs
                let final_outputs = with_timeout(limit, processor.finish()).await?;
                stats.items_out += final_outputs.len() as u64;
                if !final_outputs.is_empty() {
                    sink.write_batch(final_outputs).await?;
                }
                sink.finish().await?;
                break;
            }

            stats.items_in += items.len() as u64;
            let outputs = with_timeout(limit, processor.process_batch(items)).await?;

            if !outputs.is_empty() {
                stats.items_out += outputs.len() as u64;
                sink.write_batch(outputs).await?;
            }
        }

        tracing::info!(
            items_in = stats.items_in,
            items_out = stats.items_out,
            "pipeline finished"
        );
        Ok(stats)
    }
}

async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(limit.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{MapProcessor, NoOpProcessor};
    use crate::sinks::CollectSink;
    use crate::sources::VecSource;
    use async_trait::async_trait;

    #[tokio::test]
    async fn test_pipeline_preserves_order() {
        let sink = CollectSink::new();
        let items = sink.items();

        let doubler = MapProcessor::new(|x: i64| x * 2);
        let stats = Pipeline::new(VecSource::new((1..=25).collect()), doubler)
            .demand_batch_size(4)
            .sink(sink)
            .await
            .unwrap();

        assert_eq!(stats, PipelineStats { items_in: 25, items_out: 25 });
        assert_eq!(*items.lock().await, (1..=25).map(|x| x * 2).collect::<Vec<_>>());
    }

    struct StalledSource;

    #[async_trait]
    impl Source for StalledSource {
        type Item = u8;

        async fn handle_demand(&mut self, _demand: usize) -> Result<Vec<Self::Item>> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stalled_source_times_out() {
        let result = Pipeline::new(StalledSource, NoOpProcessor::new())
            .operation_timeout(Duration::from_millis(20))
            .sink(CollectSink::new())
            .await;
        assert!(matches!(result, Err(Error::Timeout { duration_ms: 20 })));
    }

    #[test]
    fn test_config_from_toml() {
        let config: PipelineConfig =
            toml::from_str("operation_timeout = 1.5\ndemand_batch_size = 8").unwrap();
        assert_eq!(config.operation_timeout, Duration::from_millis(1500));
        assert_eq!(config.demand_batch_size, 8);
    }
}
