//! Fixed-shape accumulation of per-event contributions.

use async_trait::async_trait;
use serde::Serialize;

use crate::core::{Error, Processor, Result};

/// A numeric buffer whose shape is fixed at creation.
///
/// Every update must carry exactly as many values as the shape holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accumulator {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Accumulator {
    /// A zero-filled accumulator of the given shape
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; len],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// An increment of ones with this accumulator's shape
    pub fn ones_like(&self) -> Vec<f64> {
        vec![1.0; self.data.len()]
    }

    /// Element-wise add; a shape mismatch leaves the buffer untouched
    pub fn add(&mut self, increment: &[f64]) -> Result<()> {
        if increment.len() != self.data.len() {
            return Err(Error::ShapeMismatch {
                expected: self.data.len(),
                actual: increment.len(),
            });
        }
        for (acc, inc) in self.data.iter_mut().zip(increment) {
            *acc += inc;
        }
        Ok(())
    }

    /// Zero every element
    pub fn reset(&mut self) {
        self.data.fill(0.0);
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.data.clone()
    }
}

/// Adds a per-item increment into an [`Accumulator`] and emits a snapshot of
/// the running total after every item.
pub struct AccumulateProcessor<T, F> {
    accumulator: Accumulator,
    increment: F,
    _phantom: std::marker::PhantomData<fn(T)>,
}

impl<T, F> AccumulateProcessor<T, F>
where
    F: FnMut(&T) -> Vec<f64>,
{
    pub fn new(accumulator: Accumulator, increment: F) -> Self {
        Self {
            accumulator,
            increment,
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    pub fn into_accumulator(self) -> Accumulator {
        self.accumulator
    }
}

#[async_trait]
impl<T, F> Processor for AccumulateProcessor<T, F>
where
    T: Send + 'static,
    F: FnMut(&T) -> Vec<f64> + Send,
{
    type Input = T;
    type Output = Vec<f64>;

    async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
        let increment = (self.increment)(&item);
        self.accumulator.add(&increment)?;
        Ok(vec![self.accumulator.to_vec()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_leaves_buffer() {
        let mut acc = Accumulator::zeros(&[2]);
        acc.add(&[1.0, 2.0]).unwrap();
        assert!(matches!(
            acc.add(&[1.0, 2.0, 3.0]),
            Err(Error::ShapeMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert_eq!(acc.values(), &[1.0, 2.0]);
        acc.reset();
        assert_eq!(acc.values(), &[0.0, 0.0]);
    }

    #[test]
    fn test_multidimensional_shape() {
        let acc = Accumulator::zeros(&[2, 3]);
        assert_eq!(acc.len(), 6);
        assert_eq!(acc.shape(), &[2, 3]);
    }

    #[tokio::test]
    async fn test_constant_increment_sums_to_n_times() {
        let acc = Accumulator::zeros(&[2]);
        let ones = acc.ones_like();
        let mut processor = AccumulateProcessor::new(acc, move |_: &u32| ones.clone());

        let mut last = Vec::new();
        for i in 0..7 {
            last = processor.process(i).await.unwrap().remove(0);
        }

        assert_eq!(last, vec![7.0, 7.0]);
        assert_eq!(processor.into_accumulator().values(), &[7.0, 7.0]);
    }
}
