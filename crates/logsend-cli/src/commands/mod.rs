//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`collect`] - Replay messages through the metrics filter
//! - [`inspect`] - Summarize block files
//! - [`pack`] - Pack payloads into size-rotated block files
//! - [`echo`] - Republish payloads as log lines

pub mod collect;
pub mod echo;
pub mod inspect;
pub mod pack;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use logsend_metrics::Sample;
use serde_json::Value;
use tokio::io::AsyncBufRead;
use tracing::warn;

pub use collect::CollectCommand;
pub use echo::EchoCommand;
pub use inspect::InspectCommand;
pub use pack::PackCommand;

/// Opens `path`, or stdin when `None`, for line reading.
///
/// # Errors
///
/// Returns an error if the file cannot be opened.
pub fn open_input(path: Option<&Path>) -> io::Result<Box<dyn BufRead>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(io::stdin())),
    })
}

/// Async counterpart of [`open_input`].
///
/// # Errors
///
/// Returns an error if the file cannot be opened.
pub async fn open_async_input(
    path: Option<&Path>,
) -> io::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match path {
        Some(path) => Box::new(tokio::io::BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(tokio::io::BufReader::new(tokio::io::stdin())),
    };
    Ok(reader)
}

/// Reads one JSON payload per line as samples, skipping blank and
/// malformed lines.
///
/// Iteration ends at end of input or at the first read error, which is kept
/// for [`take_error`](Self::take_error).
#[derive(Debug)]
pub struct PayloadLines<R> {
    lines: io::Lines<R>,
    line: usize,
    read: usize,
    skipped: usize,
    error: Option<io::Error>,
}

impl<R: BufRead> PayloadLines<R> {
    /// Wraps a line reader.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
            read: 0,
            skipped: 0,
            error: None,
        }
    }

    /// Returns the number of payloads yielded.
    #[must_use]
    pub const fn read(&self) -> usize {
        self.read
    }

    /// Returns the number of malformed lines skipped.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Takes the read error that ended iteration, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }
}

impl<R: BufRead> Iterator for PayloadLines<R> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => {
                    self.error = Some(err);
                    return None;
                }
            };
            self.line += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(payload) => {
                    self.read += 1;
                    return Some(Sample::new(payload));
                }
                Err(err) => {
                    warn!(line = self.line, error = %err, "skipping invalid payload");
                    self.skipped += 1;
                }
            }
        }
    }
}
