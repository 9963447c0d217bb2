//! Sink implementations for the runweld library.
//!
//! The queue and run-file sinks live next to their transports in
//! [`crate::queue`] and [`crate::run`]; this module holds the in-memory ones.

use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;

use crate::core::{Result, Sink};

pub use crate::queue::QueueSink;
pub use crate::run::RunWriter;

/// A sink that collects items into a vector.
pub struct CollectSink<T> {
    items: Arc<TokioMutex<Vec<T>>>,
}

impl<T: Send + 'static> CollectSink<T> {
    /// Create a new collect sink
    pub fn new() -> Self {
        Self {
            items: Arc::new(TokioMutex::new(Vec::new())),
        }
    }

    /// Get a clone of the items Arc for external access
    pub fn items(&self) -> Arc<TokioMutex<Vec<T>>> {
        self.items.clone()
    }
}

#[async_trait]
impl<T: Send + 'static> Sink for CollectSink<T> {
    type Item = T;

    async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()> {
        let mut collected = self.items.lock().await;
        collected.extend(items);
        Ok(())
    }
}

impl<T: Send + 'static> Default for CollectSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CollectSink<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

/// A sink that counts items
pub struct CountSink<T> {
    count: Arc<TokioMutex<usize>>,
    _phantom: PhantomData<fn(T)>,
}

impl<T> CountSink<T> {
    /// Create a new count sink
    pub fn new() -> Self {
        Self {
            count: Arc::new(TokioMutex::new(0)),
            _phantom: PhantomData,
        }
    }

    /// Get the current count
    pub async fn count(&self) -> usize {
        *self.count.lock().await
    }
}

#[async_trait]
impl<T: Send + 'static> Sink for CountSink<T> {
    type Item = T;

    async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()> {
        let mut count = self.count.lock().await;
        *count += items.len();
        Ok(())
    }
}

impl<T> Default for CountSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CountSink<T> {
    fn clone(&self) -> Self {
        Self {
            count: self.count.clone(),
            _phantom: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_count_sink_shares_count() {
        let mut sink = CountSink::<u8>::new();
        let observer = sink.clone();
        sink.write_batch(vec![1, 2, 3]).await.unwrap();
        sink.write(4).await.unwrap();
        assert_eq!(observer.count().await, 4);
    }
}
