//! Batch publisher for per-event "smalldata".
//!
//! [`SmallData`] buffers one contribution per event. Every `batch_size`
//! contributions it hands the batch to each registered [`BatchCallback`], in
//! registration order, then appends the batch to its JSON-lines file and clears
//! the buffer. Callbacks run synchronously inside the event loop.
//!
//! ```rust,no_run
//! use runweld::core::Result;
//! use runweld::run::Event;
//! use runweld::smalldata::{fields, Batch, FieldValue, SmallData, SmallDataConfig};
//!
//! # async fn example(events: Vec<Event>) -> Result<()> {
//! let config = SmallDataConfig::new("my.jsonl", 5);
//! let print = |batch: &Batch| -> Result<()> {
//!     println!("{} events", batch.len());
//!     Ok(())
//! };
//! let mut smd = SmallData::register(config, vec![Box::new(print)]).await?;
//!
//! for event in &events {
//!     smd.event(event, fields([("myfloat", FieldValue::Float(2.0))])).await?;
//! }
//! smd.done().await?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::core::{json, Error, Result};
use crate::run::Event;

/// A named per-event value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Array(Vec<f64>),
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<Vec<f64>> for FieldValue {
    fn from(v: Vec<f64>) -> Self {
        FieldValue::Array(v)
    }
}

impl From<&[f64]> for FieldValue {
    fn from(v: &[f64]) -> Self {
        FieldValue::Array(v.to_vec())
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

/// Build a [`Fields`] map from name/value pairs
pub fn fields<K, I>(pairs: I) -> Fields
where
    K: Into<String>,
    I: IntoIterator<Item = (K, FieldValue)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// One event's contribution to a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub index: u64,
    pub timestamp: u64,
    pub fields: Fields,
}

/// The contributions accumulated between two flushes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Zero-based flush counter
    pub number: u64,
    pub events: Vec<Contribution>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Values of one field across the batch, `None` where an event lacked it
    pub fn column(&self, name: &str) -> Vec<Option<&FieldValue>> {
        self.events.iter().map(|c| c.fields.get(name)).collect()
    }
}

/// A line of the smalldata file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BatchRecord {
    Batch(Batch),
    Summary { fields: Fields },
}

/// Receives every flushed batch before it is written to disk.
pub trait BatchCallback: Send {
    fn on_batch(&mut self, batch: &Batch) -> Result<()>;
}

impl<F> BatchCallback for F
where
    F: FnMut(&Batch) -> Result<()> + Send,
{
    fn on_batch(&mut self, batch: &Batch) -> Result<()> {
        self(batch)
    }
}

/// Logs a one-line summary of each batch.
#[derive(Debug, Default)]
pub struct LogCallback;

impl BatchCallback for LogCallback {
    fn on_batch(&mut self, batch: &Batch) -> Result<()> {
        let first = batch.events.first().map(|c| c.index);
        let last = batch.events.last().map(|c| c.index);
        tracing::info!(
            batch = batch.number,
            events = batch.len(),
            first = ?first,
            last = ?last,
            "smalldata batch"
        );
        Ok(())
    }
}

/// Where and how often to flush
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmallDataConfig {
    pub path: PathBuf,
    pub batch_size: usize,
}

impl SmallDataConfig {
    pub fn new(path: impl Into<PathBuf>, batch_size: usize) -> Self {
        Self {
            path: path.into(),
            batch_size,
        }
    }
}

impl Default for SmallDataConfig {
    fn default() -> Self {
        Self::new("my.jsonl", 5)
    }
}

/// Totals reported by [`SmallData::done`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmallDataStats {
    pub events: u64,
    pub batches: u64,
}

/// A batch whose flush failed part way, with the number of callbacks that
/// already received it
struct HeldBatch {
    batch: Batch,
    delivered: usize,
}

/// The batch publisher.
///
/// When a callback fails the batch is held back. The next flush resumes with
/// the callback that failed, so no callback sees the same batch twice.
pub struct SmallData {
    path: PathBuf,
    batch_size: usize,
    callbacks: Vec<Box<dyn BatchCallback>>,
    buffer: Vec<Contribution>,
    held: Option<HeldBatch>,
    writer: Option<tokio::io::BufWriter<tokio::fs::File>>,
    summary: Option<Fields>,
    events: u64,
    batches: u64,
}

impl SmallData {
    /// Create (or truncate) the sink file and register the callbacks.
    pub async fn register(
        config: SmallDataConfig,
        callbacks: Vec<Box<dyn BatchCallback>>,
    ) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(Error::configuration("smalldata batch_size must be at least 1"));
        }

        let file = tokio::fs::File::create(&config.path).await.map_err(|e| {
            Error::configuration(format!(
                "cannot create smalldata file {}: {}",
                config.path.display(),
                e
            ))
        })?;

        tracing::info!(
            path = %config.path.display(),
            batch_size = config.batch_size,
            callbacks = callbacks.len(),
            "registered smalldata"
        );

        Ok(Self {
            path: config.path,
            batch_size: config.batch_size,
            callbacks,
            buffer: Vec::with_capacity(config.batch_size),
            held: None,
            writer: Some(tokio::io::BufWriter::new(file)),
            summary: None,
            events: 0,
            batches: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Contributions waiting for the next flush, including a held batch
    pub fn pending(&self) -> usize {
        self.buffer.len() + self.held.as_ref().map_or(0, |held| held.batch.len())
    }

    /// Buffer one event's fields, flushing when the batch is full.
    ///
    /// Fields holding a NaN or infinite float are rejected with a
    /// serialization error and nothing is buffered.
    pub async fn event(&mut self, event: &Event, fields: Fields) -> Result<()> {
        if self.writer.is_none() {
            return Err(Error::custom("smalldata is already done"));
        }
        json::ensure_finite(&fields)?;

        self.buffer.push(Contribution {
            index: event.index(),
            timestamp: event.timestamp(),
            fields,
        });
        self.events += 1;

        self.flush_due().await
    }

    /// Store a summary record, written once by [`done`](Self::done)
    pub fn save_summary(&mut self, fields: Fields) -> Result<()> {
        json::ensure_finite(&fields)?;
        self.summary = Some(fields);
        Ok(())
    }

    /// Flush any partial batch, write the summary and close the file
    pub async fn done(&mut self) -> Result<SmallDataStats> {
        if self.writer.is_none() {
            return Ok(self.stats());
        }

        self.flush_due().await?;
        if !self.buffer.is_empty() {
            let batch = self.take_batch();
            self.deliver(batch).await?;
        }

        if let Some(fields) = self.summary.take() {
            self.append(&BatchRecord::Summary { fields }).await?;
        }

        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await?;
        }

        tracing::info!(
            path = %self.path.display(),
            events = self.events,
            batches = self.batches,
            "smalldata done"
        );
        Ok(self.stats())
    }

    fn stats(&self) -> SmallDataStats {
        SmallDataStats {
            events: self.events,
            batches: self.batches,
        }
    }

    /// Retry a held batch, then flush every full batch in the buffer
    async fn flush_due(&mut self) -> Result<()> {
        if let Some(held) = self.held.take() {
            self.deliver(held).await?;
        }
        while self.buffer.len() >= self.batch_size {
            let batch = self.take_batch();
            self.deliver(batch).await?;
        }
        Ok(())
    }

    fn take_batch(&mut self) -> HeldBatch {
        let take = self.buffer.len().min(self.batch_size);
        HeldBatch {
            batch: Batch {
                number: self.batches,
                events: self.buffer.drain(..take).collect(),
            },
            delivered: 0,
        }
    }

    async fn deliver(&mut self, mut held: HeldBatch) -> Result<()> {
        while let Some(callback) = self.callbacks.get_mut(held.delivered) {
            if let Err(e) = callback.on_batch(&held.batch) {
                self.held = Some(held);
                return Err(Error::sink(e));
            }
            held.delivered += 1;
        }

        let record = BatchRecord::Batch(held.batch);
        if let Err(e) = self.append(&record).await {
            if let BatchRecord::Batch(batch) = record {
                self.held = Some(HeldBatch {
                    batch,
                    delivered: held.delivered,
                });
            }
            return Err(e);
        }

        if let BatchRecord::Batch(batch) = record {
            tracing::debug!(batch = batch.number, events = batch.len(), "flushed smalldata batch");
        }
        self.batches += 1;
        crate::metrics::batches_flushed(1);
        Ok(())
    }

    async fn append(&mut self, record: &BatchRecord) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::custom("smalldata is already done"))?;

        let line = json::to_line(record)?;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Read every record back from a smalldata file
pub async fn read_records(path: impl AsRef<Path>) -> Result<Vec<BatchRecord>> {
    let raw = tokio::fs::read_to_string(path).await?;
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn events(n: u64) -> Vec<Event> {
        (0..n).map(|i| Event::new(1, i, 1000 + i)).collect()
    }

    fn recording_callback(seen: Arc<Mutex<Vec<usize>>>) -> Box<dyn BatchCallback> {
        Box::new(move |batch: &Batch| -> Result<()> {
            seen.lock().unwrap().push(batch.len());
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_callback_fires_every_batch_size_events() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut smd = SmallData::register(
            SmallDataConfig::new(dir.path().join("my.jsonl"), 5),
            vec![recording_callback(seen.clone())],
        )
        .await
        .unwrap();

        for event in &events(12) {
            smd.event(event, fields([("myfloat", FieldValue::Float(2.0))]))
                .await
                .unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), vec![5, 5]);
        assert_eq!(smd.pending(), 2);

        let stats = smd.done().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![5, 5, 2]);
        assert_eq!(
            stats,
            SmallDataStats {
                events: 12,
                batches: 3
            }
        );
    }

    #[tokio::test]
    async fn test_callbacks_run_before_write_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("order.jsonl");
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let order = order.clone();
            let path = path.clone();
            move |_: &Batch| -> Result<()> {
                let written = std::fs::read_to_string(&path).unwrap().lines().count();
                order.lock().unwrap().push(("first", written));
                Ok(())
            }
        };
        let second = {
            let order = order.clone();
            move |_: &Batch| -> Result<()> {
                order.lock().unwrap().push(("second", 0));
                Ok(())
            }
        };

        let mut smd = SmallData::register(
            SmallDataConfig::new(&path, 1),
            vec![Box::new(first), Box::new(second)],
        )
        .await
        .unwrap();
        smd.event(&Event::new(1, 0, 0), Fields::new()).await.unwrap();

        // the batch is not on disk yet when callbacks see it
        assert_eq!(*order.lock().unwrap(), vec![("first", 0), ("second", 0)]);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn test_file_holds_batches_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.jsonl");
        let mut smd = SmallData::register(SmallDataConfig::new(&path, 2), vec![])
            .await
            .unwrap();

        for event in &events(3) {
            smd.event(event, fields([("arrint", FieldValue::Array(vec![1.0, 1.0]))]))
                .await
                .unwrap();
        }
        smd.save_summary(fields([("summary_int", FieldValue::Int(1))]))
            .unwrap();
        smd.done().await.unwrap();

        let records = read_records(&path).await.unwrap();
        assert_eq!(records.len(), 3);
        match &records[0] {
            BatchRecord::Batch(batch) => {
                assert_eq!(batch.number, 0);
                assert_eq!(
                    batch.column("arrint"),
                    vec![Some(&FieldValue::Array(vec![1.0, 1.0])); 2]
                );
            }
            other => panic!("unexpected record {:?}", other),
        }
        assert!(matches!(&records[1], BatchRecord::Batch(b) if b.len() == 1));
        assert_eq!(
            records[2],
            BatchRecord::Summary {
                fields: fields([("summary_int", FieldValue::Int(1))])
            }
        );
    }

    #[tokio::test]
    async fn test_failing_callback_keeps_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let failing = |_: &Batch| -> Result<()> { Err(Error::custom("srv node down")) };
        let mut smd = SmallData::register(
            SmallDataConfig::new(dir.path().join("fail.jsonl"), 2),
            vec![Box::new(failing)],
        )
        .await
        .unwrap();

        smd.event(&Event::new(1, 0, 0), Fields::new()).await.unwrap();
        let err = smd
            .event(&Event::new(1, 1, 0), Fields::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Sink(_)));
        assert_eq!(smd.pending(), 2);
    }

    #[tokio::test]
    async fn test_retry_resumes_at_failed_callback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retry.jsonl");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let attempts = Arc::new(Mutex::new(0));

        let flaky = {
            let attempts = attempts.clone();
            move |_: &Batch| -> Result<()> {
                let mut attempts = attempts.lock().unwrap();
                *attempts += 1;
                if *attempts == 1 {
                    Err(Error::custom("srv node down"))
                } else {
                    Ok(())
                }
            }
        };
        let mut smd = SmallData::register(
            SmallDataConfig::new(&path, 2),
            vec![recording_callback(seen.clone()), Box::new(flaky)],
        )
        .await
        .unwrap();

        let events = events(3);
        smd.event(&events[0], Fields::new()).await.unwrap();
        assert!(smd.event(&events[1], Fields::new()).await.is_err());
        smd.event(&events[2], Fields::new()).await.unwrap();
        assert_eq!(smd.pending(), 1);

        let stats = smd.done().await.unwrap();
        // the first callback saw the retried batch once
        assert_eq!(*seen.lock().unwrap(), vec![2, 1]);
        assert_eq!(*attempts.lock().unwrap(), 3);
        assert_eq!(stats.batches, 2);

        let records = read_records(&path).await.unwrap();
        let numbers: Vec<u64> = records
            .iter()
            .filter_map(|r| match r {
                BatchRecord::Batch(b) => Some(b.number),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_non_finite_fields_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nan.jsonl");
        let mut smd = SmallData::register(SmallDataConfig::new(&path, 1), vec![])
            .await
            .unwrap();

        let err = smd
            .event(&Event::new(1, 0, 0), fields([("f", FieldValue::Float(f64::NAN))]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        assert_eq!(smd.pending(), 0);
        assert!(smd
            .save_summary(fields([("sum", FieldValue::Array(vec![f64::INFINITY]))]))
            .is_err());

        smd.event(&Event::new(1, 1, 0), fields([("f", FieldValue::Float(1.5))]))
            .await
            .unwrap();
        let stats = smd.done().await.unwrap();
        assert_eq!(stats.events, 1);
        assert_eq!(read_records(&path).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = SmallDataConfig::new(dir.path().join("x"), 0);
        let result = SmallData::register(config, vec![]).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_event_after_done_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut smd = SmallData::register(SmallDataConfig::new(dir.path().join("d"), 3), vec![])
            .await
            .unwrap();
        smd.done().await.unwrap();
        assert!(smd.event(&Event::new(1, 0, 0), Fields::new()).await.is_err());
    }
}
