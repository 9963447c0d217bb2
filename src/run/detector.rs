//! Detector handles and calibration constants.

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::run::event::{Event, Readout};

/// Detector entry in the experiment metadata.
///
/// Calibration constants are optional. When present they hold one value per
/// readout element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pedestal: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain: Option<Vec<f64>>,
}

impl DetectorInfo {
    pub fn with_pedestal(mut self, pedestal: Vec<f64>) -> Self {
        self.pedestal = Some(pedestal);
        self
    }

    pub fn with_gain(mut self, gain: Vec<f64>) -> Self {
        self.gain = Some(gain);
        self
    }
}

/// A detector bound to a run, used to pull its data out of events.
#[derive(Debug, Clone)]
pub struct Detector {
    name: String,
    info: DetectorInfo,
}

impl Detector {
    pub(crate) fn new(name: impl Into<String>, info: DetectorInfo) -> Self {
        Self {
            name: name.into(),
            info,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uncalibrated readout for this detector in `event`
    pub fn raw<'e>(&self, event: &'e Event) -> Option<&'e Readout> {
        event.detector(&self.name)
    }

    /// Calibrated readout: `(raw - pedestal) * gain`, element by element.
    ///
    /// Returns `Ok(None)` when the detector did not fire in this event.
    pub fn calib(&self, event: &Event) -> Result<Option<Readout>> {
        let Some(raw) = self.raw(event) else {
            return Ok(None);
        };

        let n = raw.len();
        let pedestal = constants(self.info.pedestal.as_deref(), n)?;
        let gain = constants(self.info.gain.as_deref(), n)?;

        let values = raw
            .values()
            .iter()
            .enumerate()
            .map(|(i, v)| (v - pedestal.map_or(0.0, |p| p[i])) * gain.map_or(1.0, |g| g[i]))
            .collect();

        Readout::new(raw.shape().to_vec(), values).map(Some)
    }
}

fn constants(values: Option<&[f64]>, expected: usize) -> Result<Option<&[f64]>> {
    match values {
        Some(v) if v.len() != expected => Err(Error::ShapeMismatch {
            expected,
            actual: v.len(),
        }),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> Event {
        Event::new(1, 0, 0).with_readout(
            "xppcspad",
            Readout::new(vec![2, 2], vec![10.0, 20.0, 30.0, 40.0]).unwrap(),
        )
    }

    #[test]
    fn test_calib_applies_pedestal_and_gain() {
        let info = DetectorInfo::default()
            .with_pedestal(vec![1.0, 2.0, 3.0, 4.0])
            .with_gain(vec![2.0, 2.0, 0.5, 1.0]);
        let det = Detector::new("xppcspad", info);

        let calib = det.calib(&event()).unwrap().unwrap();
        assert_eq!(calib.shape(), &[2, 2]);
        assert_eq!(calib.values(), &[18.0, 36.0, 13.5, 36.0]);
    }

    #[test]
    fn test_calib_without_constants_is_raw() {
        let det = Detector::new("xppcspad", DetectorInfo::default());
        let calib = det.calib(&event()).unwrap().unwrap();
        assert_eq!(Some(&calib), det.raw(&event()));
    }

    #[test]
    fn test_calib_missing_detector() {
        let det = Detector::new("epix", DetectorInfo::default());
        assert!(det.calib(&event()).unwrap().is_none());
    }

    #[test]
    fn test_calib_constant_length_mismatch() {
        let det = Detector::new(
            "xppcspad",
            DetectorInfo::default().with_pedestal(vec![1.0]),
        );
        assert!(matches!(
            det.calib(&event()),
            Err(Error::ShapeMismatch {
                expected: 4,
                actual: 1
            })
        ));
    }
}
