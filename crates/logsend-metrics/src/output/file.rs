//! Size-rotated file output.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use tracing::debug;

use super::path::RotatingPathGenerator;
use super::{OutputBackend, Publish};
use crate::error::{MetricsError, Result};

struct CurrentFile {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

/// Writes published items to files of roughly `target_size` bytes.
///
/// Once a write makes the current file reach the target it is closed; the
/// next publish opens a fresh path from the generator.
pub struct FileBackend {
    paths: RotatingPathGenerator,
    target_size: u64,
    current: Option<CurrentFile>,
    finished: Vec<PathBuf>,
    closed: bool,
}

impl std::fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackend")
            .field("paths", &self.paths)
            .field("target_size", &self.target_size)
            .field("current", &self.current.as_ref().map(|c| &c.path))
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl FileBackend {
    /// Creates a backend rotating at `target_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `target_size` is zero or the directory cannot
    /// be created.
    pub fn new(paths: RotatingPathGenerator, target_size: u64) -> Result<Self> {
        if target_size == 0 {
            return Err(MetricsError::InvalidConfig(
                "target_size must be greater than zero".to_string(),
            ));
        }
        std::fs::create_dir_all(paths.dir())?;
        Ok(Self {
            paths,
            target_size,
            current: None,
            finished: Vec::new(),
            closed: false,
        })
    }

    /// Returns every file written so far, in order.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = self.finished.clone();
        files.extend(self.current.as_ref().map(|c| c.path.clone()));
        files
    }

    fn open_next(&mut self) -> Result<()> {
        let current = loop {
            let path = self.paths.next_path()?;
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    break CurrentFile {
                        path,
                        writer: BufWriter::new(file),
                        written: 0,
                    };
                }
                // Lost a race with another writer; take the next counter.
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(err.into()),
            }
        };
        debug!(path = %current.path.display(), "opened output file");
        self.current = Some(current);
        Ok(())
    }

    fn finish_current(&mut self) -> Result<()> {
        let Some(mut current) = self.current.take() else {
            return Ok(());
        };
        current.writer.flush()?;
        current.writer.get_ref().sync_all()?;
        debug!(
            path = %current.path.display(),
            bytes = current.written,
            "closed output file"
        );
        self.finished.push(current.path);
        Ok(())
    }
}

impl OutputBackend for FileBackend {
    fn publish(&mut self, item: &dyn Publish) -> Result<u64> {
        if self.closed {
            return Err(MetricsError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "file backend is closed",
            )));
        }
        if self.current.is_none() {
            self.open_next()?;
        }
        let target_size = self.target_size;
        let Some(current) = self.current.as_mut() else {
            return Ok(0);
        };
        let written = item.publish(&mut current.writer)?;
        current.written += written;
        if current.written >= target_size {
            self.finish_current()?;
        }
        Ok(written)
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(current) = self.current.as_mut() {
            current.writer.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.finish_current()
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "failed to close file backend");
        }
    }
}
