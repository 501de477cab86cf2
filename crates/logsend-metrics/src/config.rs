//! Collector configuration.
//!
//! This module provides:
//! - [`CollectorConfig`] — Serializable flush, block and naming settings
//! - [`CollectorOptions`] — A validated config paired with a [`SinkFactory`]

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};
use crate::sample::sanitize_schema;
use crate::sink::{SinkFactory, file_sink_factory};

/// Shortest accepted flush interval.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Smallest accepted number of samples per block.
pub const MIN_SAMPLE_COUNT: usize = 10;

/// Smallest accepted number of blocks per file.
pub const MIN_BLOCK_COUNT: usize = 1;

/// Settings shared by every collector a filter creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// How often pending samples are flushed to blocks.
    #[serde(rename = "flush_interval_ms", with = "serde_millis")]
    pub flush_interval: Duration,
    /// Maximum samples per block.
    pub sample_count: usize,
    /// Blocks written to a file before it is rotated.
    pub block_count: usize,
    /// Prefix of every output name.
    pub file_prefix: String,
    /// Capture structured messages without an explicit schema, keyed by shape.
    pub capture_all_structured: bool,
    /// Directory used by the default file sink factory.
    pub output_dir: PathBuf,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            sample_count: 1000,
            block_count: 10,
            file_prefix: "metrics".to_string(),
            capture_all_structured: false,
            output_dir: PathBuf::from("metrics"),
        }
    }
}

impl CollectorConfig {
    /// Creates a config writing under `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    /// Sets the flush interval.
    #[must_use]
    pub const fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the maximum samples per block.
    #[must_use]
    pub const fn with_sample_count(mut self, count: usize) -> Self {
        self.sample_count = count;
        self
    }

    /// Sets the number of blocks per file.
    #[must_use]
    pub const fn with_block_count(mut self, count: usize) -> Self {
        self.block_count = count;
        self
    }

    /// Sets the output name prefix.
    #[must_use]
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Enables or disables shape-keyed capture of untagged structured messages.
    #[must_use]
    pub const fn with_capture_all_structured(mut self, enabled: bool) -> Self {
        self.capture_all_structured = enabled;
        self
    }

    /// Loads a config from a JSON document. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON or fails validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are invalid.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Checks every value against its floor.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval < MIN_FLUSH_INTERVAL {
            return Err(MetricsError::InvalidConfig(format!(
                "flush_interval must be at least {}ms, got {}ms",
                MIN_FLUSH_INTERVAL.as_millis(),
                self.flush_interval.as_millis()
            )));
        }
        if self.sample_count < MIN_SAMPLE_COUNT {
            return Err(MetricsError::InvalidConfig(format!(
                "sample_count must be at least {MIN_SAMPLE_COUNT}, got {}",
                self.sample_count
            )));
        }
        if self.block_count < MIN_BLOCK_COUNT {
            return Err(MetricsError::InvalidConfig(format!(
                "block_count must be at least {MIN_BLOCK_COUNT}, got {}",
                self.block_count
            )));
        }
        if self.file_prefix.trim().is_empty() {
            return Err(MetricsError::InvalidConfig(
                "file_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the output name for `schema` at `sequence`.
    #[must_use]
    pub fn output_name(&self, schema: &str, sequence: u64) -> String {
        format!("{}.{}.{sequence}", self.file_prefix, sanitize_schema(schema))
    }
}

/// A config together with the factory that opens output sinks.
#[derive(Clone)]
pub struct CollectorOptions {
    config: CollectorConfig,
    sink_factory: SinkFactory,
}

impl fmt::Debug for CollectorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectorOptions")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CollectorOptions {
    /// Validates `config` and pairs it with a file sink factory on `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config fails validation.
    pub fn new(config: CollectorConfig) -> Result<Self> {
        config.validate()?;
        let sink_factory = file_sink_factory(config.output_dir.clone());
        Ok(Self {
            config,
            sink_factory,
        })
    }

    /// Validates `config` and pairs it with a custom sink factory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config fails validation.
    pub fn with_sink_factory(config: CollectorConfig, sink_factory: SinkFactory) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sink_factory,
        })
    }

    /// Returns the config.
    #[must_use]
    pub const fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Returns the sink factory.
    #[must_use]
    pub const fn sink_factory(&self) -> &SinkFactory {
        &self.sink_factory
    }
}

/// Serializes a [`Duration`] as whole milliseconds.
mod serde_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
