//! Put the calibrated `xppcspad` image of every event on the `psana` queue.
//!
//! Reads `runweld.toml` from the working directory when present; the data
//! directory defaults to `$TEST_XTC_DIR/.tmp`. The run must declare both the
//! `xppcspad` detector and the `HX2:DVD:GCC:01:PMON` environment detector.

use runweld::prelude::*;
use tracing_subscriber::EnvFilter;

fn keep_event(_event: &Event) -> bool {
    true
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match tokio::fs::try_exists("runweld.toml").await {
        Ok(true) => DaqConfig::load("runweld.toml").await?,
        _ => DaqConfig::default(),
    }
    .apply_env()?;

    let queue = QueueClient::connect_str(&config.queue.endpoint)
        .await?
        .queue(config.queue.name.as_str());

    let ds = DataSource::open(config.data_source()?.filter(keep_event)).await?;

    for run in ds.runs() {
        let det = run.detector("xppcspad")?;
        let edet = run.detector("HX2:DVD:GCC:01:PMON")?;
        tracing::debug!(detector = edet.name(), run = run.number(), "environment detector found");

        let stats = Pipeline::new(run.events(), CalibProcessor::new(det))
            .with_config(config.pipeline.clone())
            .sink(QueueSink::new(queue.clone()))
            .await?;

        tracing::info!(run = run.number(), sent = stats.items_out, "run complete");
    }
    Ok(())
}
