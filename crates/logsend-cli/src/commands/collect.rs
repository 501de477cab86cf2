//! Collect command implementation.
//!
//! Reads JSONL messages, forwards each to the destination sender and lets
//! the metrics filter capture metric-bearing ones into block files.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use logsend_core::{LogMessage, Sender};
use logsend_metrics::{CollectorConfig, CollectorOptions, MetricsFilter};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::cli::CollectArgs;
use crate::error::CliError;
use crate::output::{CollectReport, OutputFormat, SchemaReport};

/// Collect command executor.
#[derive(Debug, Clone)]
pub struct CollectCommand {
    args: CollectArgs,
}

impl CollectCommand {
    /// Create a new collect command.
    #[must_use]
    pub const fn new(args: CollectArgs) -> Self {
        Self { args }
    }

    /// Builds the collector config from `--config` and flag overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if no output directory is given, the config file
    /// cannot be loaded, or the result fails validation.
    pub fn config(&self) -> Result<CollectorConfig, CliError> {
        let args = &self.args;
        let mut config = match &args.config {
            Some(path) => CollectorConfig::from_file(path)?,
            None => CollectorConfig::default(),
        };

        match &args.dir {
            Some(dir) => config.output_dir.clone_from(dir),
            None if args.config.is_none() => {
                return Err(CliError::Config(
                    "an output directory is required (--dir or --config)".to_string(),
                ));
            }
            None => {}
        }
        if let Some(prefix) = &args.prefix {
            config.file_prefix.clone_from(prefix);
        }
        if let Some(ms) = args.flush_interval_ms {
            config.flush_interval = Duration::from_millis(ms);
        }
        if let Some(samples) = args.samples {
            config.sample_count = samples;
        }
        if let Some(blocks) = args.blocks {
            config.block_count = blocks;
        }
        config.capture_all_structured |= args.capture_all;

        config.validate()?;
        Ok(config)
    }

    /// Execute the collect command.
    ///
    /// The report is written to `writer` even when closing the filter fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid, the input cannot be read,
    /// or closing the filter reports errors.
    pub async fn execute<R, W>(
        &self,
        input: R,
        destination: Arc<dyn Sender>,
        writer: &mut W,
        format: &OutputFormat,
    ) -> Result<CollectReport, CliError>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let config = self.config()?;
        info!(
            dir = %config.output_dir.display(),
            prefix = %config.file_prefix,
            "collecting metrics"
        );
        let filter = MetricsFilter::new(destination, CollectorOptions::new(config)?)?;

        let mut report = CollectReport::default();
        let mut lines = input.lines();
        let mut line_no = 0usize;
        let read = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            };
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match LogMessage::from_json_line(&line) {
                Ok(msg) => {
                    filter.send(&msg);
                    report.messages += 1;
                }
                Err(err) => {
                    warn!(line = line_no, error = %err, "skipping invalid message");
                    report.skipped += 1;
                }
            }
        };

        let collectors: Vec<_> = filter
            .collected_schemas()
            .iter()
            .filter_map(|schema| filter.collector(schema))
            .collect();
        let closed = filter.close().await;

        report.schemas = collectors
            .iter()
            .map(|collector| SchemaReport {
                schema: collector.schema().to_string(),
                stats: collector.stats(),
            })
            .collect();
        format.write(writer, &report)?;

        read?;
        closed?;
        Ok(report)
    }
}
