//! Error types for metric capture and persistence.

use std::io;

use logsend_core::SendError;
use thiserror::Error;

/// Errors that can occur while capturing or persisting metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A configuration value is missing or below its floor.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No tokio runtime was available to host collector workers.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),

    /// An output resource could not be opened.
    #[error("failed to open output {name}: {source}")]
    SinkOpen {
        /// Name handed to the sink factory
        name: String,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Writing a block failed.
    #[error("flush failed for schema {schema}: {source}")]
    Flush {
        /// Schema key of the collector
        schema: String,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Closing an output resource failed.
    #[error("failed to close output for schema {schema}: {source}")]
    SinkClose {
        /// Schema key of the collector
        schema: String,
        /// Underlying I/O error
        source: io::Error,
    },

    /// The collector no longer accepts samples.
    #[error("collector for schema {0} is stopped")]
    CollectorStopped(String),

    /// The filter was closed.
    #[error("metrics filter is closed")]
    FilterClosed,

    /// A collector worker task panicked or was aborted.
    #[error("collector worker failed: {0}")]
    Worker(String),

    /// A block frame could not be decoded.
    #[error("block decode error: {0}")]
    Decode(String),

    /// The rotating path generator ran out of counter values.
    #[error("path space exhausted for {base} with {digits} digits")]
    PathSpaceExhausted {
        /// Base file name
        base: String,
        /// Counter width
        digits: usize,
    },

    /// A histogram value fell outside its bounds under the reject policy.
    #[error("value {value} outside histogram range [{min}, {max})")]
    OutOfRange {
        /// Rejected value
        value: f64,
        /// Inclusive lower bound
        min: f64,
        /// Exclusive upper bound
        max: f64,
    },

    /// Process statistics could not be sampled.
    #[error("runtime stats unavailable: {0}")]
    Stats(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Several errors from one operation, in the order they occurred.
    #[error("{}", join_messages(.0))]
    Multiple(Vec<MetricsError>),
}

fn join_messages(errors: &[MetricsError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl MetricsError {
    /// Folds errors into one result, flattening nested [`MetricsError::Multiple`].
    ///
    /// No errors yields `Ok(())` and exactly one is returned as-is.
    pub fn join(errors: impl IntoIterator<Item = Self>) -> Result<()> {
        let mut flat = Vec::new();
        for err in errors {
            match err {
                Self::Multiple(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Ok(()),
            1 => Err(flat.remove(0)),
            _ => Err(Self::Multiple(flat)),
        }
    }
}

impl From<MetricsError> for SendError {
    fn from(err: MetricsError) -> Self {
        match err {
            MetricsError::Multiple(errors) => {
                Self::Multiple(errors.into_iter().map(Self::from).collect())
            }
            other => Self::other(other),
        }
    }
}

/// Result type alias for metrics operations.
pub type Result<T> = std::result::Result<T, MetricsError>;
