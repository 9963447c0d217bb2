//! Core traits and types for the runweld library.
//!
//! This module contains the fundamental traits and error types that define
//! the event processing model.

pub mod error;
pub(crate) mod json;
pub mod traits;

// Re-export core items
pub use error::{Error, Result};
pub use traits::{Processor, ProcessorExt, Sink, Source};
