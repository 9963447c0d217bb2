//! In-process named queues.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::core::{Error, Result};
use crate::queue::QueueTransport;

/// Default number of values a named queue holds before `put` waits
pub const DEFAULT_CAPACITY: usize = 1024;

struct NamedQueue {
    tx: mpsc::Sender<Value>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Value>>,
}

/// A set of bounded FIFO queues addressed by name.
///
/// Queues are created by `put` and by a waiting `get`; the other readers only
/// look a queue up and treat a missing one as empty. Clones share the same
/// queues, so a broker can be handed to a [`QueueClient`](crate::queue::QueueClient)
/// and kept by the consumer.
#[derive(Clone)]
pub struct QueueBroker {
    queues: Arc<Mutex<HashMap<String, Arc<NamedQueue>>>>,
    capacity: usize,
}

impl QueueBroker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    fn lookup(&self, name: &str) -> Option<Arc<NamedQueue>> {
        let queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues.get(name).cloned()
    }

    fn named(&self, name: &str) -> Arc<NamedQueue> {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues
            .entry(name.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel(self.capacity);
                Arc::new(NamedQueue {
                    tx,
                    rx: tokio::sync::Mutex::new(rx),
                })
            })
            .clone()
    }

    /// Enqueue a value, waiting while the queue is full
    pub async fn put(&self, name: &str, value: Value) -> Result<()> {
        let queue = self.named(name);
        queue.tx.send(value).await?;
        Ok(())
    }

    /// Dequeue the oldest value, waiting until one is available
    pub async fn get(&self, name: &str) -> Result<Value> {
        let queue = self.named(name);
        let mut rx = queue.rx.lock().await;
        rx.recv().await.ok_or(Error::ChannelClosed)
    }

    /// Dequeue the oldest value if one is ready
    pub fn try_get(&self, name: &str) -> Option<Value> {
        let queue = self.lookup(name)?;
        let mut rx = queue.rx.try_lock().ok()?;
        rx.try_recv().ok()
    }

    /// Take every value currently queued
    pub fn drain(&self, name: &str) -> Vec<Value> {
        std::iter::from_fn(|| self.try_get(name)).collect()
    }

    /// Number of values waiting in a queue
    pub fn len(&self, name: &str) -> usize {
        self.lookup(name)
            .map_or(0, |queue| queue.tx.max_capacity() - queue.tx.capacity())
    }

    pub fn is_empty(&self, name: &str) -> bool {
        self.len(name) == 0
    }

    /// Names of the queues created so far, sorted
    pub fn names(&self) -> Vec<String> {
        let queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = queues.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

impl Default for QueueBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueueBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueBroker")
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[async_trait]
impl QueueTransport for QueueBroker {
    async fn send(&self, queue: &str, value: Value) -> Result<()> {
        self.put(queue, value).await
    }

    fn describe(&self) -> String {
        "in-process".to_string()
    }
}
