//! Feeding events into a smalldata publisher from inside a pipeline.

use async_trait::async_trait;

use crate::core::{Processor, Result};
use crate::run::Event;
use crate::smalldata::{Fields, SmallData, SmallDataStats};

/// Records each event's fields into a [`SmallData`] and passes the event on
/// unchanged. Finishing the pipeline calls [`SmallData::done`].
pub struct SmallDataTap<F> {
    smd: SmallData,
    extract: F,
    stats: Option<SmallDataStats>,
}

impl<F> SmallDataTap<F>
where
    F: FnMut(&Event) -> Fields,
{
    pub fn new(smd: SmallData, extract: F) -> Self {
        Self {
            smd,
            extract,
            stats: None,
        }
    }

    /// Totals, available once the pipeline has finished
    pub fn stats(&self) -> Option<SmallDataStats> {
        self.stats
    }
}

#[async_trait]
impl<F> Processor for SmallDataTap<F>
where
    F: FnMut(&Event) -> Fields + Send,
{
    type Input = Event;
    type Output = Event;

    async fn process(&mut self, event: Self::Input) -> Result<Vec<Self::Output>> {
        let fields = (self.extract)(&event);
        self.smd.event(&event, fields).await?;
        Ok(vec![event])
    }

    async fn finish(&mut self) -> Result<Vec<Self::Output>> {
        self.stats = Some(self.smd.done().await?);
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smalldata::{fields, read_records, BatchRecord, FieldValue, SmallDataConfig};

    #[tokio::test]
    async fn test_tap_passes_events_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tap.jsonl");
        let smd = SmallData::register(SmallDataConfig::new(&path, 2), vec![])
            .await
            .unwrap();
        let mut tap = SmallDataTap::new(smd, |event: &Event| {
            fields([("ts", FieldValue::Int(event.timestamp() as i64))])
        });

        let events: Vec<Event> = (0..3).map(|i| Event::new(1, i, i * 10)).collect();
        let out = tap.process_batch(events.clone()).await.unwrap();
        assert_eq!(out, events);
        assert!(tap.stats().is_none());

        tap.finish().await.unwrap();
        assert_eq!(tap.stats().map(|s| s.batches), Some(2));

        let records = read_records(&path).await.unwrap();
        assert!(matches!(&records[1], BatchRecord::Batch(b) if b.events[0].timestamp == 20));
    }
}
