//! # logsend-metrics
//!
//! Schema-routed metric capture for logsend senders.
//!
//! This crate provides:
//!
//! - [`MetricsFilter`] — A pass-through [`Sender`](logsend_core::Sender) that
//!   captures metric payloads per schema key
//! - [`RotatingCollector`] — Buffers samples for one schema and writes them as
//!   compressed blocks into rotating outputs
//! - [`Block`] / [`BlockReader`] — The LZ4 block frame and its reader
//! - [`FileBackend`] / [`LoggerBackend`] — Output backends for [`persist`]
//! - [`Histogram`] / [`RuntimeStats`] — Metric payload producers
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use logsend_core::{LogMessage, MemorySender, Priority, Sender};
//! use logsend_metrics::{CollectorConfig, CollectorOptions, MetricsFilter};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = CollectorOptions::new(CollectorConfig::new("/var/lib/metrics"))?;
//! let filter = MetricsFilter::new(Arc::new(MemorySender::new("app")), options)?;
//!
//! filter.send(&LogMessage::metric(Priority::Info, "cpu", json!({"user": 0.42})));
//! filter.close().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod block;
pub mod collector;
pub mod config;
pub mod error;
pub mod filter;
pub mod histogram;
pub mod output;
pub mod sample;
pub mod sink;
pub mod stats;

// Re-export main types
pub use block::{BLOCK_MAGIC, Block, BlockReader, BlockSummary, Blocks, StreamSummary, blocks};
pub use collector::{CollectorState, CollectorStats, RotatingCollector, SequenceCounter};
pub use config::{
    CollectorConfig, CollectorOptions, MIN_BLOCK_COUNT, MIN_FLUSH_INTERVAL, MIN_SAMPLE_COUNT,
};
pub use error::{MetricsError, Result};
pub use filter::MetricsFilter;
pub use histogram::{Histogram, OutOfRangePolicy};
pub use output::{
    FileBackend, LoggerBackend, OutputBackend, PersistStats, Publish, RotatingPathGenerator,
    SenderWriter, persist,
};
pub use sample::{Sample, sanitize_schema, shape_key};
pub use sink::{FileSink, MemorySinkRecord, MemorySinks, OutputSink, SinkFactory, file_sink_factory};
pub use stats::{RuntimeStats, STATS_SCHEMA, StatsDelta, StatsSnapshot};
