//! Recorded events and their detector readouts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{Error, Result};

/// One detector's readout for one event: a flat buffer plus its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readout {
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl Readout {
    /// Create a readout, checking that the shape covers exactly `values`
    pub fn new(shape: Vec<usize>, values: Vec<f64>) -> Result<Self> {
        let readout = Self { shape, values };
        readout.validate()?;
        Ok(readout)
    }

    /// A one-dimensional readout
    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let expected: usize = self.shape.iter().product();
        if expected != self.values.len() {
            return Err(Error::ShapeMismatch {
                expected,
                actual: self.values.len(),
            });
        }
        Ok(())
    }
}

/// A single recorded event within a run.
///
/// Events are read-only once recorded. Detector data is looked up by the
/// detector name declared in the experiment metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    run: u32,
    index: u64,
    timestamp: u64,
    #[serde(default)]
    detectors: BTreeMap<String, Readout>,
}

impl Event {
    /// Create an event with no detector data
    pub fn new(run: u32, index: u64, timestamp: u64) -> Self {
        Self {
            run,
            index,
            timestamp,
            detectors: BTreeMap::new(),
        }
    }

    /// Attach a detector readout
    pub fn with_readout(mut self, detector: impl Into<String>, readout: Readout) -> Self {
        self.detectors.insert(detector.into(), readout);
        self
    }

    pub fn run(&self) -> u32 {
        self.run
    }

    /// Position of the event within its run
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Acquisition timestamp in nanoseconds
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Readout for a detector, if it fired in this event
    pub fn detector(&self, name: &str) -> Option<&Readout> {
        self.detectors.get(name)
    }

    pub fn detector_names(&self) -> impl Iterator<Item = &str> {
        self.detectors.keys().map(String::as_str)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.detectors.values().try_for_each(Readout::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readout_shape_checked() {
        assert!(Readout::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).is_ok());
        let err = Readout::new(vec![2, 2], vec![1.0]).unwrap_err();
        assert!(matches!(
            err,
            Error::ShapeMismatch {
                expected: 4,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_event_detector_lookup() {
        let event = Event::new(1, 0, 100).with_readout("cspad", Readout::from_values(vec![1.0]));
        assert_eq!(event.detector("cspad").map(Readout::len), Some(1));
        assert!(event.detector("epix").is_none());
        assert_eq!(event.detector_names().collect::<Vec<_>>(), vec!["cspad"]);
    }

    #[test]
    fn test_event_json_without_detectors() {
        let event: Event = serde_json::from_str(r#"{"run":3,"index":7,"timestamp":42}"#).unwrap();
        assert_eq!((event.run(), event.index(), event.timestamp()), (3, 7, 42));
        assert!(event.validate().is_ok());
    }
}
