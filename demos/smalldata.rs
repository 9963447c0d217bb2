//! Accumulate a per-event increment, publish smalldata batches and put the
//! running sum on the `psana` queue after every event.
//!
//! Reads `runweld.toml` from the working directory when present; the data
//! directory defaults to `$TEST_XTC_DIR/.tmp`.

use runweld::prelude::*;
use tracing_subscriber::EnvFilter;

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

    let ds = DataSource::open(config.data_source()?).await?;
    let smd = SmallData::register(config.smalldata.clone(), vec![Box::new(LogCallback)]).await?;
    let run = ds
        .runs()
        .next()
        .ok_or_else(|| Error::configuration("data source has no runs"))?;

    // Zeros rather than nothing, so a run with no events still has a sum
    let arrsum = Accumulator::zeros(&[2]);
    let myones = arrsum.ones_like();
    let increment = myones.clone();

    let processor = SmallDataTap::new(smd, move |_: &Event| {
        fields([
            ("myfloat", FieldValue::Float(2.0)),
            ("arrint", FieldValue::Array(myones.clone())),
        ])
    })
    .then(AccumulateProcessor::new(arrsum, move |_: &Event| increment.clone()));

    let stats = Pipeline::new(run.events(), processor)
        .with_config(config.pipeline.clone())
        .sink(QueueSink::new(queue))
        .await?;

    tracing::info!(events = stats.items_in, "run complete");
    Ok(())
}
