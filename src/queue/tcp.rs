//! Line-delimited JSON transport to a remote queue scheduler.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::core::{Error, Result};
use crate::queue::QueueTransport;

/// Frame sent for every `put`
#[derive(Debug, Serialize)]
struct PutFrame<'a> {
    op: &'static str,
    queue: &'a str,
    value: &'a Value,
}

/// A single connection to the scheduler; frames are written one at a time.
pub struct TcpTransport {
    address: String,
    stream: Mutex<BufWriter<TcpStream>>,
}

impl TcpTransport {
    /// Connect to `host:port`, failing with a connection error after `timeout`
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self> {
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(Error::connection(format!(
                    "cannot reach scheduler at {}: {}",
                    address, e
                )))
            }
            Err(_) => {
                return Err(Error::connection(format!(
                    "timed out after {}ms connecting to {}",
                    timeout.as_millis(),
                    address
                )))
            }
        };
        stream.set_nodelay(true)?;

        Ok(Self {
            address: address.to_string(),
            stream: Mutex::new(BufWriter::new(stream)),
        })
    }
}

#[async_trait]
impl QueueTransport for TcpTransport {
    async fn send(&self, queue: &str, value: Value) -> Result<()> {
        let frame = PutFrame {
            op: "put",
            queue,
            value: &value,
        };
        let mut line = serde_json::to_vec(&frame)?;
        line.push(b'\n');

        let mut stream = self.stream.lock().await;
        let written = match stream.write_all(&line).await {
            Ok(()) => stream.flush().await,
            Err(e) => Err(e),
        };

        written.map_err(|e| {
            Error::connection(format!("lost scheduler at {}: {}", self.address, e))
        })
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }
}
