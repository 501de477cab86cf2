//! # logsend-cli
//!
//! The `logsend` command-line interface.
//!
//! Provides commands for:
//! - Replaying JSONL message streams through the metrics filter (`collect`)
//! - Summarizing block files (`inspect`)
//! - Packing payloads into size-rotated block files (`pack`)
//! - Republishing payloads as log lines (`echo`)
//!
//! ```text
//! JSONL ──► MetricsFilter ──► WriterSender (stdout)
//!                │
//!                └──► RotatingCollector ──► {dir}/{prefix}.{schema}.{seq}
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, CollectArgs, Commands, EchoArgs, Format, InspectArgs, PackArgs};
pub use error::CliError;
pub use output::OutputFormat;
