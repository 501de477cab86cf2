//! Pack command implementation.
//!
//! Streams JSONL payloads into blocks and persists them through a
//! size-rotated [`FileBackend`].

use std::io::{BufRead, Write};

use logsend_metrics::{FileBackend, OutputBackend, RotatingPathGenerator, blocks, persist};
use tracing::info;

use super::PayloadLines;
use crate::cli::PackArgs;
use crate::error::CliError;
use crate::output::{OutputFormat, PackReport};

/// Pack command executor.
#[derive(Debug, Clone)]
pub struct PackCommand {
    args: PackArgs,
}

impl PackCommand {
    /// Create a new pack command.
    #[must_use]
    pub const fn new(args: PackArgs) -> Self {
        Self { args }
    }

    /// Execute the pack command.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid, the input cannot be
    /// read, or a file cannot be written.
    pub fn execute<R, W>(&self, input: R, writer: &mut W, format: &OutputFormat) -> Result<PackReport, CliError>
    where
        R: BufRead,
        W: Write,
    {
        let args = &self.args;
        if args.samples == 0 {
            return Err(CliError::Config("--samples must be at least 1".to_string()));
        }
        let paths = RotatingPathGenerator::new(&args.dir, args.base.as_str(), args.digits)?
            .with_extension(args.extension.as_str());
        let mut backend = FileBackend::new(paths, args.target_size)?;

        let mut payloads = PayloadLines::new(input);
        let persisted = persist(&mut backend, blocks(&mut payloads, args.samples));
        let closed = backend.close();
        let stats = persisted?;
        closed?;
        if let Some(err) = payloads.take_error() {
            return Err(err.into());
        }

        let report = PackReport {
            samples: payloads.read(),
            skipped: payloads.skipped(),
            blocks: stats.items,
            bytes: stats.bytes,
            files: backend.files(),
        };
        info!(files = report.files.len(), blocks = report.blocks, "packed samples");
        format.write(writer, &report)?;
        Ok(report)
    }
}
