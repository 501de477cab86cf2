//! Inspect command implementation.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use logsend_metrics::{BlockReader, MetricsError};

use crate::cli::InspectArgs;
use crate::error::CliError;
use crate::output::{FileReport, InspectReport, OutputFormat};

/// Inspect command executor.
#[derive(Debug, Clone)]
pub struct InspectCommand {
    args: InspectArgs,
}

impl InspectCommand {
    /// Create a new inspect command.
    #[must_use]
    pub const fn new(args: InspectArgs) -> Self {
        Self { args }
    }

    /// Execute the inspect command.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first file that cannot be read or decoded.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat) -> Result<InspectReport, CliError> {
        let files = self
            .args
            .files
            .iter()
            .map(|path| summarize_file(path))
            .collect::<Result<Vec<_>, _>>()?;
        let report = InspectReport(files);
        format.write(writer, &report)?;
        Ok(report)
    }
}

/// Reads every frame of a block file.
///
/// # Errors
///
/// Returns [`CliError::BlockFile`] if the file cannot be opened or decoded.
pub fn summarize_file(path: &Path) -> Result<FileReport, CliError> {
    let wrap = |source: MetricsError| CliError::BlockFile {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|e| wrap(e.into()))?;
    let summary = BlockReader::new(BufReader::new(file))
        .summarize()
        .map_err(wrap)?;
    Ok(FileReport {
        path: path.to_path_buf(),
        blocks: summary.blocks,
        samples: summary.range.samples,
        first: summary.range.first,
        last: summary.range.last,
    })
}
