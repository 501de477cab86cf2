//! Output backends for publishing blocks and samples outside the filter.
//!
//! This module provides:
//! - [`Publish`] — Something that can write itself to a byte sink
//! - [`OutputBackend`] — A destination for published items
//! - [`persist`] — Drains an iterator of publishable items into a backend
//! - [`FileBackend`] — Size-rotated files named by [`RotatingPathGenerator`]
//! - [`LoggerBackend`] — Publishes through an existing [`Sender`](logsend_core::Sender)

mod file;
mod logger;
mod path;

use std::io::{self, Write};

use serde::Serialize;

use crate::block::Block;
use crate::error::Result;
use crate::sample::Sample;

pub use file::FileBackend;
pub use logger::{LoggerBackend, SenderWriter};
pub use path::RotatingPathGenerator;

/// An item that knows how to write itself.
pub trait Publish {
    /// Writes the item, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if encoding or writing fails.
    fn publish(&self, writer: &mut dyn Write) -> io::Result<u64>;
}

impl Publish for Block {
    fn publish(&self, writer: &mut dyn Write) -> io::Result<u64> {
        self.write_to(writer)
    }
}

impl Publish for Sample {
    fn publish(&self, writer: &mut dyn Write) -> io::Result<u64> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        writer.write_all(&line)?;
        Ok(line.len() as u64)
    }
}

impl<P: Publish + ?Sized> Publish for &P {
    fn publish(&self, writer: &mut dyn Write) -> io::Result<u64> {
        (**self).publish(writer)
    }
}

impl<P: Publish + ?Sized> Publish for Box<P> {
    fn publish(&self, writer: &mut dyn Write) -> io::Result<u64> {
        (**self).publish(writer)
    }
}

/// A destination for published items.
pub trait OutputBackend {
    /// Publishes one item, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the item cannot be written.
    fn publish(&mut self, item: &dyn Publish) -> Result<u64>;

    /// Flushes buffered output.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> Result<()>;

    /// Flushes and releases the backend. Later calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush or close fails.
    fn close(&mut self) -> Result<()>;
}

/// Totals reported by [`persist`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistStats {
    /// Items published
    pub items: u64,
    /// Bytes written
    pub bytes: u64,
}

/// Publishes every item of `items` into `backend`, pulling them lazily.
///
/// Stops at the first error. The backend is flushed but not closed.
///
/// # Errors
///
/// Returns the first publish or flush error.
pub fn persist<B, I>(backend: &mut B, items: I) -> Result<PersistStats>
where
    B: OutputBackend + ?Sized,
    I: IntoIterator,
    I::Item: Publish,
{
    let mut stats = PersistStats::default();
    for item in items {
        stats.bytes += backend.publish(&item)?;
        stats.items += 1;
    }
    backend.flush()?;
    tracing::debug!(items = stats.items, bytes = stats.bytes, "persisted items");
    Ok(stats)
}
