//! Error types for the event pipeline.

use std::sync::Arc;
use thiserror::Error;

/// The main error type for sources, processors, sinks and the queue client.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A data directory, experiment, run or detector could not be resolved
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The queue endpoint could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// A value could not be serialized for the queue or the batch file
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An update did not match the fixed shape of an accumulator
    #[error("Shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A source failed to read the next item
    #[error("Source error: {0}")]
    Source(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// A processor failed to transform an item
    #[error("Processor error: {0}")]
    Processor(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// A sink failed to write an item
    #[error("Sink error: {0}")]
    Sink(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// An I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// An operation timed out
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// A channel was closed unexpectedly
    #[error("Channel was closed unexpectedly")]
    ChannelClosed,

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),
}

// Convenience constructors
impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Error::Configuration(message.into())
    }

    /// Create a connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Error::Connection(message.into())
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Error::Serialization(message.into())
    }

    /// Create a source error from any error type
    pub fn source_error<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Source(Arc::new(error))
    }

    /// Create a processor error from any error type
    pub fn processor<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Processor(Arc::new(error))
    }

    /// Create a sink error from any error type
    pub fn sink<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Sink(Arc::new(error))
    }

    /// Create a timeout error
    pub fn timeout(duration_ms: u64) -> Self {
        Error::Timeout { duration_ms }
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }
}

// Common conversions
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::ChannelClosed
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error as _;

        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "I/O error: gone");
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = Error::ShapeMismatch {
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Shape mismatch: expected 2 values, got 3");
    }
}
