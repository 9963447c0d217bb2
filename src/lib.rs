//! # Detector event pipelines
//!
//! This crate streams recorded detector events from an experiment run through
//! a per-event transform and forwards the results to a named queue, with an
//! optional "smalldata" batch publisher on the side.
//!
//! ## Core Concepts
//!
//! - **Source**: yields items on demand; [`sources::EventSource`] reads a run lazily
//! - **Processor**: maps each item to zero or more outputs (accumulation, calibration)
//! - **Sink**: receives outputs in batches; [`queue::QueueSink`] puts them on a queue
//! - **SmallData**: buffers per-event fields and flushes them every `batch_size` events
//! - **Pipeline**: drives source → processor → sink on the calling task
//!
//! ## Example
//!
//! ```rust,no_run
//! use runweld::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ds = DataSource::open(DataSourceConfig::new("xpptut13", 1, ".tmp")).await?;
//!     let queue = QueueClient::connect_str("tcp://127.0.0.1:8786")
//!         .await?
//!         .queue("psana");
//!
//!     for run in ds.runs() {
//!         let calib = CalibProcessor::new(run.detector("xppcspad")?);
//!         Pipeline::new(run.events(), calib)
//!             .sink(QueueSink::new(queue.clone()))
//!             .await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod metrics;
pub mod pipeline;
pub mod processors;
pub mod queue;
pub mod run;
pub mod sinks;
pub mod smalldata;
pub mod sources;

// Re-export commonly used items
pub mod prelude {
    pub use crate::config::DaqConfig;
    pub use crate::core::{Error, Processor, ProcessorExt, Result, Sink, Source};
    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineStats};
    pub use crate::processors::{
        AccumulateProcessor, Accumulator, CalibProcessor, MapProcessor, NoOpProcessor,
        SmallDataTap,
    };
    pub use crate::queue::{Endpoint, Queue, QueueBroker, QueueClient, QueueSink};
    pub use crate::run::{DataSource, DataSourceConfig, Detector, Event, Readout, Run};
    pub use crate::sinks::{CollectSink, CountSink};
    pub use crate::smalldata::{
        fields, Batch, BatchCallback, FieldValue, Fields, LogCallback, SmallData,
        SmallDataConfig,
    };
    pub use crate::sources::{EventSource, VecSource};
}

// Re-export main error type
pub use crate::core::{Error, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
