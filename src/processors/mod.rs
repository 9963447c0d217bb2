//! Processor implementations for the runweld library.
//!
//! This module provides the per-event transforms that sit between an event
//! source and the queue: generic mapping, array accumulation, detector
//! calibration and the smalldata tap.

pub mod accumulate;
pub mod calib;
pub mod combinators;
pub mod smalldata;

use async_trait::async_trait;

use crate::core::{Processor, Result};

pub use accumulate::{AccumulateProcessor, Accumulator};
pub use calib::CalibProcessor;
pub use combinators::Then;
pub use smalldata::SmallDataTap;

/// A processor that maps items using a function.
pub struct MapProcessor<F, T, U> {
    f: F,
    _phantom: std::marker::PhantomData<fn(T) -> U>,
}

impl<F, T, U> MapProcessor<F, T, U> {
    /// Create a new map processor
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<F, T, U> Processor for MapProcessor<F, T, U>
where
    F: FnMut(T) -> U + Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    type Input = T;
    type Output = U;

    async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
        Ok(vec![(self.f)(item)])
    }
}

/// A processor that passes through items unchanged
pub struct NoOpProcessor<T> {
    _phantom: std::marker::PhantomData<fn(T) -> T>,
}

impl<T> NoOpProcessor<T> {
    /// Create a new no-op processor
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Processor for NoOpProcessor<T> {
    type Input = T;
    type Output = T;

    async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
        Ok(vec![item])
    }
}

impl<T> Default for NoOpProcessor<T> {
    fn default() -> Self {
        Self::new()
    }
}
