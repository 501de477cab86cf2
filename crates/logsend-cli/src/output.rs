//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use logsend_metrics::CollectorStats;
use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

fn format_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
}

/// Result of a collect run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectReport {
    /// Messages read and forwarded.
    pub messages: usize,
    /// Lines that were not valid messages.
    pub skipped: usize,
    /// Per-schema collector counters.
    pub schemas: Vec<SchemaReport>,
}

/// Counters for one schema.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaReport {
    /// Schema key.
    pub schema: String,
    /// Collector counters.
    #[serde(flatten)]
    pub stats: CollectorStats,
}

impl TableDisplay for CollectReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Messages: {} ({} skipped)", self.messages, self.skipped)?;
        if self.schemas.is_empty() {
            writeln!(writer, "No metrics captured.")?;
            return Ok(());
        }
        writeln!(writer)?;
        writeln!(
            writer,
            "{:<32}  {:>8}  {:>8}  {:>6}  {:>6}",
            "SCHEMA", "ADDED", "WRITTEN", "BLOCKS", "FILES"
        )?;
        writeln!(writer, "{}", "─".repeat(70))?;
        for report in &self.schemas {
            writeln!(
                writer,
                "{:<32}  {:>8}  {:>8}  {:>6}  {:>6}",
                report.schema,
                report.stats.samples_added,
                report.stats.samples_written,
                report.stats.blocks_written,
                report.stats.files_opened
            )?;
        }
        Ok(())
    }
}

/// Summary of one block file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// File path.
    pub path: PathBuf,
    /// Number of blocks.
    pub blocks: usize,
    /// Number of samples.
    pub samples: usize,
    /// First sample timestamp.
    pub first: Option<DateTime<Utc>>,
    /// Last sample timestamp.
    pub last: Option<DateTime<Utc>>,
}

/// Summaries of several block files.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct InspectReport(pub Vec<FileReport>);

impl TableDisplay for InspectReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(
            writer,
            "{:<40}  {:>6}  {:>8}  {:<23}  {:<23}",
            "FILE", "BLOCKS", "SAMPLES", "FIRST", "LAST"
        )?;
        writeln!(writer, "{}", "─".repeat(108))?;
        for file in &self.0 {
            writeln!(
                writer,
                "{:<40}  {:>6}  {:>8}  {:<23}  {:<23}",
                file.path.display(),
                file.blocks,
                file.samples,
                format_time(file.first),
                format_time(file.last)
            )?;
        }
        Ok(())
    }
}

/// Result of a pack run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PackReport {
    /// Samples packed.
    pub samples: usize,
    /// Lines that were not valid JSON.
    pub skipped: usize,
    /// Blocks written.
    pub blocks: u64,
    /// Bytes written.
    pub bytes: u64,
    /// Files written, in order.
    pub files: Vec<PathBuf>,
}

impl TableDisplay for PackReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Samples:  {} ({} skipped)", self.samples, self.skipped)?;
        writeln!(writer, "Blocks:   {}", self.blocks)?;
        writeln!(writer, "Bytes:    {}", self.bytes)?;
        writeln!(writer, "Files:")?;
        for file in &self.files {
            writeln!(writer, "  {}", file.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inspect_report() -> InspectReport {
        InspectReport(vec![FileReport {
            path: PathBuf::from("m.cpu.0"),
            blocks: 10,
            samples: 100,
            first: None,
            last: None,
        }])
    }

    #[test]
    fn table_lists_files() {
        let output = OutputFormat::new(Format::Table)
            .to_string(&inspect_report())
            .unwrap_or_default();
        assert!(output.contains("m.cpu.0"));
        assert!(output.contains("100"));
    }

    #[test]
    fn json_is_an_array() {
        let output = OutputFormat::new(Format::Json)
            .to_string(&inspect_report())
            .unwrap_or_default();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap_or_default();
        assert_eq!(parsed[0]["samples"], 100);
        assert!(OutputFormat::new(Format::Json).is_json());
    }

    #[test]
    fn collect_report_flattens_stats() {
        let report = CollectReport {
            messages: 3,
            skipped: 1,
            schemas: vec![SchemaReport {
                schema: "cpu".into(),
                stats: CollectorStats {
                    samples_added: 2,
                    samples_written: 2,
                    blocks_written: 1,
                    files_opened: 1,
                    files_closed: 1,
                },
            }],
        };
        let json = serde_json::to_value(&report).unwrap_or_default();
        assert_eq!(json["schemas"][0]["samples_written"], 2);

        let table = OutputFormat::default().to_string(&report).unwrap_or_default();
        assert!(table.contains("Messages: 3 (1 skipped)"));
        assert!(table.contains("cpu"));
    }

    #[test]
    fn empty_collect_report() {
        let table = OutputFormat::default()
            .to_string(&CollectReport::default())
            .unwrap_or_default();
        assert!(table.contains("No metrics captured."));
    }
}
