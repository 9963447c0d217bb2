//! Forwarding per-event results to named distributed queues.
//!
//! A [`QueueClient`] is connected to an [`Endpoint`]. Each [`Queue`] handle
//! serializes values to JSON and hands them to the transport without waiting
//! for any consumer, so delivery is at most once from the producer's side.

pub mod memory;
pub mod tcp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{json, Error, Result, Sink};

pub use memory::QueueBroker;
pub use tcp::TcpTransport;

/// How long `connect` waits for a TCP scheduler
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Moves serialized values to the queue owner.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    async fn send(&self, queue: &str, value: Value) -> Result<()>;

    /// Human-readable endpoint, for logs
    fn describe(&self) -> String;
}

/// Where the queues live.
#[derive(Clone)]
pub enum Endpoint {
    /// `tcp://host:port`
    Tcp(String),
    /// `scheduler-file:<path>`, a JSON file whose `address` names a TCP endpoint
    SchedulerFile(PathBuf),
    /// Queues owned by this process
    Memory(QueueBroker),
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(address) = s.strip_prefix("tcp://") {
            if address.is_empty() {
                return Err(Error::configuration("empty tcp endpoint"));
            }
            Ok(Endpoint::Tcp(address.to_string()))
        } else if let Some(path) = s.strip_prefix("scheduler-file:") {
            Ok(Endpoint::SchedulerFile(PathBuf::from(path)))
        } else {
            Err(Error::configuration(format!(
                "unsupported endpoint {:?}, expected tcp://host:port or scheduler-file:<path>",
                s
            )))
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(address) => write!(f, "tcp://{}", address),
            Endpoint::SchedulerFile(path) => write!(f, "scheduler-file:{}", path.display()),
            Endpoint::Memory(_) => write!(f, "in-process"),
        }
    }
}

/// The part of a scheduler file we read
#[derive(Debug, Deserialize)]
struct SchedulerInfo {
    address: String,
}

/// Queue settings as they appear in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub endpoint: String,
    pub name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            endpoint: "scheduler-file:scheduler.json".to_string(),
            name: "psana".to_string(),
        }
    }
}

/// A connection to a queue endpoint.
#[derive(Clone)]
pub struct QueueClient {
    transport: Arc<dyn QueueTransport>,
}

impl QueueClient {
    /// Connect to an endpoint.
    ///
    /// Fails with a connection error if the scheduler cannot be reached or the
    /// scheduler file cannot be read.
    pub async fn connect(endpoint: Endpoint) -> Result<Self> {
        let transport: Arc<dyn QueueTransport> = match endpoint {
            Endpoint::Memory(broker) => Arc::new(broker),
            Endpoint::Tcp(address) => {
                Arc::new(TcpTransport::connect(&address, CONNECT_TIMEOUT).await?)
            }
            Endpoint::SchedulerFile(path) => {
                let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    Error::connection(format!(
                        "cannot read scheduler file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let info: SchedulerInfo = serde_json::from_str(&raw).map_err(|e| {
                    Error::connection(format!("invalid scheduler file {}: {}", path.display(), e))
                })?;
                let address = match info.address.parse::<Endpoint>() {
                    Ok(Endpoint::Tcp(address)) => address,
                    _ => {
                        return Err(Error::connection(format!(
                            "scheduler file {} names unsupported address {}",
                            path.display(),
                            info.address
                        )))
                    }
                };
                Arc::new(TcpTransport::connect(&address, CONNECT_TIMEOUT).await?)
            }
        };

        tracing::info!(endpoint = %transport.describe(), "connected to queue endpoint");
        Ok(Self { transport })
    }

    /// Parse a descriptor and connect
    pub async fn connect_str(descriptor: &str) -> Result<Self> {
        Self::connect(descriptor.parse()?).await
    }

    /// Handle to the queue called `name`
    pub fn queue(&self, name: impl Into<String>) -> Queue {
        Queue {
            name: name.into(),
            transport: self.transport.clone(),
        }
    }
}

impl fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueClient")
            .field("endpoint", &self.transport.describe())
            .finish()
    }
}

/// A named queue on a connected endpoint.
#[derive(Clone)]
pub struct Queue {
    name: String,
    transport: Arc<dyn QueueTransport>,
}

impl Queue {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serialize `value` and enqueue it.
    ///
    /// A value that cannot be serialized, including one holding a NaN or
    /// infinite float, fails with a serialization error and nothing is sent.
    pub async fn put<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let value = json::to_value(value)?;
        self.transport.send(&self.name, value).await?;
        tracing::debug!(queue = %self.name, "enqueued value");
        crate::metrics::values_enqueued(1);
        Ok(())
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("endpoint", &self.transport.describe())
            .finish()
    }
}

/// A sink that puts every item onto a queue
pub struct QueueSink<T> {
    queue: Queue,
    sent: u64,
    _phantom: PhantomData<fn(T)>,
}

impl<T> QueueSink<T> {
    pub fn new(queue: Queue) -> Self {
        Self {
            queue,
            sent: 0,
            _phantom: PhantomData,
        }
    }

    /// Values enqueued so far
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

#[async_trait]
impl<T: Serialize + Send + Sync + 'static> Sink for QueueSink<T> {
    type Item = T;

    async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()> {
        for item in &items {
            self.queue.put(item).await?;
            self.sent += 1;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        tracing::info!(queue = %self.queue.name(), sent = self.sent, "queue sink finished");
        Ok(())
    }
}
