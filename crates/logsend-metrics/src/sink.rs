//! Output sinks that collectors write block frames into.
//!
//! This module provides:
//! - [`OutputSink`] — A writable resource that is closed exactly once
//! - [`SinkFactory`] — Opens a sink for an output name
//! - [`file_sink_factory`] — The default factory, creating fresh files in a directory
//! - [`MemorySinks`] — An in-memory factory that tracks opens and closes

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

/// A writable output resource owned by one collector.
pub trait OutputSink: Write + Send {
    /// Flushes and releases the resource.
    ///
    /// Taking `self` by box means a sink cannot be closed twice.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Opens the sink for an output name such as `metrics.cpu.0`.
///
/// A factory reports a name that is already taken with
/// [`io::ErrorKind::AlreadyExists`]; collectors then try the next sequence.
pub type SinkFactory = Arc<dyn Fn(&str) -> io::Result<Box<dyn OutputSink>> + Send + Sync>;

/// A buffered, newly created file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    /// Creates the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::AlreadyExists`] if the file exists, or any
    /// other error from creating it.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl OutputSink for FileSink {
    fn close(self: Box<Self>) -> io::Result<()> {
        let file = self.writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()
    }
}

/// Returns a factory creating `{dir}/{name}` files, creating `dir` on demand.
///
/// Existing files are never reopened, so output left by an earlier run is
/// kept intact and the collector moves on to the next free name.
#[must_use]
pub fn file_sink_factory(dir: impl Into<PathBuf>) -> SinkFactory {
    let dir = dir.into();
    Arc::new(move |name: &str| -> io::Result<Box<dyn OutputSink>> {
        fs::create_dir_all(&dir)?;
        let sink = FileSink::create(dir.join(name))?;
        tracing::debug!(path = %sink.path().display(), "opened output file");
        Ok(Box::new(sink))
    })
}

/// What a [`MemorySinks`] factory recorded for one opened sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySinkRecord {
    /// Output name passed to the factory
    pub name: String,
    /// Bytes written so far
    pub bytes: Vec<u8>,
    /// How many times the sink was closed
    pub closes: usize,
}

#[derive(Debug, Default)]
struct SinkSlot {
    name: String,
    bytes: Mutex<Vec<u8>>,
    closes: AtomicUsize,
}

#[derive(Debug, Default)]
struct MemorySinksInner {
    slots: Mutex<Vec<Arc<SinkSlot>>>,
    fail_opens: AtomicBool,
    fail_writes: AtomicBool,
    fail_closes: AtomicBool,
}

/// An in-memory sink factory that remembers every sink it opened.
///
/// Clones share state, so a test can keep one handle and hand the
/// [`factory`](Self::factory) to a filter.
#[derive(Debug, Clone, Default)]
pub struct MemorySinks {
    inner: Arc<MemorySinksInner>,
}

impl MemorySinks {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent open fail.
    pub fn fail_opens(&self, fail: bool) {
        self.inner.fail_opens.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent close fail. The close is still counted.
    pub fn fail_closes(&self, fail: bool) {
        self.inner.fail_closes.store(fail, Ordering::SeqCst);
    }

    /// Returns a factory that opens sinks tracked by this handle.
    ///
    /// Like the file factory, a name that was opened before is refused with
    /// [`io::ErrorKind::AlreadyExists`].
    #[must_use]
    pub fn factory(&self) -> SinkFactory {
        let inner = Arc::clone(&self.inner);
        Arc::new(move |name: &str| -> io::Result<Box<dyn OutputSink>> {
            if inner.fail_opens.load(Ordering::SeqCst) {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("cannot open {name}"),
                ));
            }
            let mut slots = inner.slots.lock();
            if slots.iter().any(|slot| slot.name == name) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{name} already exists"),
                ));
            }
            let slot = Arc::new(SinkSlot {
                name: name.to_string(),
                ..SinkSlot::default()
            });
            slots.push(Arc::clone(&slot));
            drop(slots);
            Ok(Box::new(MemorySink {
                slot,
                owner: Arc::clone(&inner),
            }))
        })
    }

    /// Returns a snapshot of every opened sink, in open order.
    #[must_use]
    pub fn records(&self) -> Vec<MemorySinkRecord> {
        self.inner
            .slots
            .lock()
            .iter()
            .map(|slot| MemorySinkRecord {
                name: slot.name.clone(),
                bytes: slot.bytes.lock().clone(),
                closes: slot.closes.load(Ordering::SeqCst),
            })
            .collect()
    }

    /// Returns the number of sinks opened so far.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.inner.slots.lock().len()
    }
}

struct MemorySink {
    slot: Arc<SinkSlot>,
    owner: Arc<MemorySinksInner>,
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.owner.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "no space left"));
        }
        self.slot.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputSink for MemorySink {
    fn close(self: Box<Self>) -> io::Result<()> {
        self.slot.closes.fetch_add(1, Ordering::SeqCst);
        if self.owner.fail_closes.load(Ordering::SeqCst) {
            return Err(io::Error::other("close failed"));
        }
        Ok(())
    }
}
