//! Lazy event stream over a recorded run file.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use crate::core::{Error, Result, Source};
use crate::run::{Event, EventFilter};

/// A run file line that could not be decoded into an event
#[derive(Debug, thiserror::Error)]
#[error("{}:{line}: {source}", path.display())]
pub struct EventDecodeError {
    pub path: PathBuf,
    pub line: u64,
    #[source]
    pub source: serde_json::Error,
}

/// Streams events from a run file in recorded order.
///
/// The file is opened on the first pull. The filter, if any, runs exactly once
/// per raw event and rejected events never reach the caller.
pub struct EventSource {
    path: PathBuf,
    filter: Option<EventFilter>,
    lines: Option<LinesStream<BufReader<tokio::fs::File>>>,
    line: u64,
    exhausted: bool,
}

impl EventSource {
    pub fn new(path: PathBuf, filter: Option<EventFilter>) -> Self {
        Self {
            path,
            filter,
            lines: None,
            line: 0,
            exhausted: false,
        }
    }

    async fn next_raw(&mut self) -> Result<Option<Event>> {
        if self.lines.is_none() {
            let file = tokio::fs::File::open(&self.path).await?;
            tracing::debug!(path = %self.path.display(), "reading run file");
            self.lines = Some(LinesStream::new(BufReader::new(file).lines()));
        }
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };

        while let Some(line) = lines.next().await {
            let line = line?;
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }

            let event: Event = serde_json::from_str(&line).map_err(|source| {
                Error::source_error(EventDecodeError {
                    path: self.path.clone(),
                    line: self.line,
                    source,
                })
            })?;
            event.validate()?;
            return Ok(Some(event));
        }

        Ok(None)
    }
}

#[async_trait]
impl Source for EventSource {
    type Item = Event;

    async fn handle_demand(&mut self, demand: usize) -> Result<Vec<Self::Item>> {
        let mut events = Vec::with_capacity(demand);

        while events.len() < demand && !self.exhausted {
            let Some(event) = self.next_raw().await? else {
                self.exhausted = true;
                tracing::debug!(path = %self.path.display(), lines = self.line, "run exhausted");
                break;
            };
            crate::metrics::events_read(1);

            match self.filter {
                Some(ref filter) if !filter(&event) => crate::metrics::events_filtered(1),
                _ => events.push(event),
            }
        }

        Ok(events)
    }
}
