//! Per-event detector calibration.

use async_trait::async_trait;

use crate::core::{Processor, Result};
use crate::run::{Detector, Event, Readout};

/// Emits the calibrated readout of one detector for every event it fired in.
///
/// Events without data for the detector produce no output.
pub struct CalibProcessor {
    detector: Detector,
    skipped: u64,
}

impl CalibProcessor {
    pub fn new(detector: Detector) -> Self {
        Self {
            detector,
            skipped: 0,
        }
    }

    /// Events that carried no data for the detector
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[async_trait]
impl Processor for CalibProcessor {
    type Input = Event;
    type Output = Readout;

    async fn process(&mut self, event: Self::Input) -> Result<Vec<Self::Output>> {
        match self.detector.calib(&event)? {
            Some(readout) => Ok(vec![readout]),
            None => {
                self.skipped += 1;
                tracing::debug!(
                    detector = self.detector.name(),
                    event = event.index(),
                    "detector absent from event"
                );
                Ok(vec![])
            }
        }
    }

    async fn finish(&mut self) -> Result<Vec<Self::Output>> {
        if self.skipped > 0 {
            tracing::warn!(
                detector = self.detector.name(),
                skipped = self.skipped,
                "events without detector data"
            );
        }
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::DetectorInfo;

    #[tokio::test]
    async fn test_calibrates_and_skips_missing() {
        let info = DetectorInfo::default().with_pedestal(vec![1.0, 1.0]);
        let detector = Detector::new("cspad", info);
        let mut processor = CalibProcessor::new(detector);

        let hit = Event::new(1, 0, 0).with_readout("cspad", Readout::from_values(vec![3.0, 5.0]));
        let miss = Event::new(1, 1, 0);

        let outputs = processor.process_batch(vec![hit, miss]).await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].values(), &[2.0, 4.0]);
        assert_eq!(processor.skipped(), 1);
    }
}
