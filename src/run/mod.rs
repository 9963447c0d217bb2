//! Experiment runs: the event data model, detector calibration and the
//! on-disk run layout.

pub mod datasource;
pub mod detector;
pub mod event;
pub mod recorder;

pub use datasource::{
    data_dir_from_env, DataSource, DataSourceConfig, EventFilter, ExperimentMetadata, Run,
    DATA_DIR_ENV,
};
pub use detector::{Detector, DetectorInfo};
pub use event::{Event, Readout};
pub use recorder::{RunRecorder, RunWriter};
