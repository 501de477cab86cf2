//! CLI error types.

use logsend_core::SendError;
use logsend_metrics::MetricsError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// A block file could not be read.
    #[error("{}: {source}", path.display())]
    BlockFile {
        /// File path
        path: std::path::PathBuf,
        /// Decode or I/O error
        source: MetricsError,
    },

    /// Metric capture or persistence failed.
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// Sending or closing a sender failed.
    #[error("send error: {0}")]
    Send(#[from] SendError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_error_display_config() {
        let err = CliError::Config("no output directory".into());
        assert_eq!(err.to_string(), "configuration error: no output directory");
    }

    #[test]
    fn block_file_error_names_path() {
        let err = CliError::BlockFile {
            path: "m.cpu.0".into(),
            source: MetricsError::Decode("bad frame magic".into()),
        };
        assert_eq!(err.to_string(), "m.cpu.0: block decode error: bad frame magic");
    }

    #[test]
    fn cli_error_from_metrics_error() {
        let err = CliError::from(MetricsError::FilterClosed);
        assert_eq!(err.to_string(), "metrics filter is closed");
    }

    #[test]
    fn cli_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err = CliError::from(io_err);
        assert!(matches!(cli_err, CliError::Io(_)));
    }
}
