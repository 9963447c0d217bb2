//! Core traits for the source/sink system.
//!
//! Sources are pull-based: the pipeline asks for up to `demand` items at a time and
//! an empty batch marks the end of the stream. Processors turn each input into zero
//! or more outputs, and sinks receive the outputs in batches.

use crate::core::error::Result;
use async_trait::async_trait;

/// A source generates items on demand.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use runweld::core::{Result, Source};
///
/// struct CounterSource {
///     current: u64,
///     max: u64,
/// }
///
/// #[async_trait]
/// impl Source for CounterSource {
///     type Item = u64;
///
///     async fn handle_demand(&mut self, demand: usize) -> Result<Vec<Self::Item>> {
///         let mut items = Vec::with_capacity(demand);
///         while items.len() < demand && self.current <= self.max {
///             items.push(self.current);
///             self.current += 1;
///         }
///         Ok(items)
///     }
/// }
/// ```
#[async_trait]
pub trait Source {
    /// The type of items this source generates
    type Item: Send + 'static;

    /// Return up to `demand` items, or fewer if exhausted.
    /// An empty Vec indicates the source is completely exhausted.
    async fn handle_demand(&mut self, demand: usize) -> Result<Vec<Self::Item>>;

    /// Get the next single item.
    async fn next(&mut self) -> Result<Option<Self::Item>> {
        let items = self.handle_demand(1).await?;
        Ok(items.into_iter().next())
    }
}

/// A sink receives items from upstream in batches.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use runweld::core::{Result, Sink};
///
/// struct LogSink;
///
/// #[async_trait]
/// impl Sink for LogSink {
///     type Item = String;
///
///     async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()> {
///         for item in items {
///             println!("Logged: {}", item);
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Sink {
    /// The type of items this sink accepts
    type Item: Send + 'static;

    /// Write a batch of items.
    async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()>;

    /// Write a single item.
    async fn write(&mut self, item: Self::Item) -> Result<()> {
        self.write_batch(vec![item]).await
    }

    /// Called when the upstream source is exhausted.
    ///
    /// This allows sinks to flush any buffered state.
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A processor maps each input item to zero or more output items.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use runweld::core::{Result, Processor};
///
/// struct DoubleProcessor;
///
/// #[async_trait]
/// impl Processor for DoubleProcessor {
///     type Input = i32;
///     type Output = i32;
///
///     async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
///         Ok(vec![item * 2])
///     }
/// }
/// ```
#[async_trait]
pub trait Processor {
    /// The type of items this processor accepts
    type Input: Send + 'static;
    /// The type of items this processor produces
    type Output: Send + 'static;

    /// Process one input item.
    ///
    /// Returning an empty Vec means the item was consumed but produced no output.
    async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>>;

    /// Process a batch of inputs in order, concatenating the outputs.
    async fn process_batch(&mut self, items: Vec<Self::Input>) -> Result<Vec<Self::Output>> {
        let mut outputs = Vec::with_capacity(items.len());
        for item in items {
            outputs.extend(self.process(item).await?);
        }
        Ok(outputs)
    }

    /// Called when upstream is exhausted, allowing final output generation.
    async fn finish(&mut self) -> Result<Vec<Self::Output>> {
        Ok(vec![])
    }
}

/// Extension trait for chaining processors
pub trait ProcessorExt: Processor {
    /// Feed every output of this processor into `next`
    fn then<N>(self, next: N) -> crate::processors::combinators::Then<Self, N>
    where
        Self: Sized,
        N: Processor<Input = Self::Output>,
    {
        crate::processors::combinators::Then::new(self, next)
    }
}

impl<P: Processor> ProcessorExt for P {}
