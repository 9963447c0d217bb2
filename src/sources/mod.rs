//! Source implementations for the runweld library.

pub mod events;

use async_trait::async_trait;
use std::collections::VecDeque;

use crate::core::{Result, Source};

pub use events::{EventDecodeError, EventSource};

/// A source that yields items from a vector
pub struct VecSource<T> {
    items: VecDeque<T>,
}

impl<T> VecSource<T> {
    /// Create a new vector source
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
        }
    }

    /// Check if the source has more items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the number of remaining items
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[async_trait]
impl<T: Send + 'static> Source for VecSource<T> {
    type Item = T;

    async fn handle_demand(&mut self, demand: usize) -> Result<Vec<Self::Item>> {
        let n = demand.min(self.items.len());
        Ok(self.items.drain(..n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_vec_source_demand() {
        let mut source = VecSource::new(vec![1, 2, 3]);
        assert_eq!(source.handle_demand(2).await.unwrap(), vec![1, 2]);
        assert_eq!(source.len(), 1);
        assert_eq!(source.next().await.unwrap(), Some(3));
        assert!(source.is_empty());
        assert!(source.handle_demand(2).await.unwrap().is_empty());
    }
}
