//! The message abstraction senders consume.
//!
//! This module provides:
//! - [`Message`] — The trait every sendable message implements
//! - [`LogMessage`] — A general-purpose message with optional structured payload
//! - [`LogMessageBuilder`] — Fluent construction of [`LogMessage`]

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::Priority;

/// A message that can be handed to a [`Sender`](crate::Sender).
///
/// `Display` provides the human-readable rendering used by text senders.
pub trait Message: fmt::Display + Send + Sync {
    /// The message priority.
    fn priority(&self) -> Priority;

    /// Whether the message carries anything worth sending.
    fn loggable(&self) -> bool;

    /// Whether the payload is structured data rather than plain text.
    fn structured(&self) -> bool;

    /// The raw payload. `Value::Null` for text-only messages.
    fn raw(&self) -> &Value;

    /// The explicit schema tag for metric-bearing messages.
    ///
    /// Messages that return `Some` are always routed to the collector
    /// for that schema; others are only captured when a filter is
    /// configured to classify structured payloads by shape.
    fn schema(&self) -> Option<&str> {
        None
    }
}

/// A log message with optional text, structured payload and schema tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Severity
    #[serde(default = "default_priority")]
    pub priority: Priority,
    /// Human-readable text
    #[serde(default, alias = "text")]
    pub message: String,
    /// Structured payload
    #[serde(default)]
    pub payload: Value,
    /// Explicit schema tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// When the message was created
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

const fn default_priority() -> Priority {
    Priority::Info
}

impl LogMessage {
    /// Creates a plain text message.
    #[must_use]
    pub fn new(priority: Priority, message: impl Into<String>) -> Self {
        Self {
            priority,
            message: message.into(),
            payload: Value::Null,
            schema: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a message carrying only a structured payload.
    #[must_use]
    pub fn structured(priority: Priority, payload: Value) -> Self {
        Self {
            payload,
            ..Self::new(priority, String::new())
        }
    }

    /// Creates a metric-bearing message tagged with `schema`.
    #[must_use]
    pub fn metric(priority: Priority, schema: impl Into<String>, payload: Value) -> Self {
        Self {
            schema: Some(schema.into()),
            ..Self::structured(priority, payload)
        }
    }

    /// Creates a new message builder.
    #[must_use]
    pub fn builder() -> LogMessageBuilder {
        LogMessageBuilder::default()
    }

    /// Parses one JSON line (`{"priority", "message", "schema", "payload"}`).
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the line is not a valid message.
    pub fn from_json_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

impl Message for LogMessage {
    fn priority(&self) -> Priority {
        self.priority
    }

    fn loggable(&self) -> bool {
        self.priority.is_valid() && (!self.message.trim().is_empty() || !self.payload.is_null())
    }

    fn structured(&self) -> bool {
        self.payload.is_object() || self.payload.is_array()
    }

    fn raw(&self) -> &Value {
        &self.payload
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.message.trim();
        match (text.is_empty(), self.payload.is_null()) {
            (false, true) => f.write_str(text),
            (true, false) => write!(f, "{}", self.payload),
            (false, false) => write!(f, "{text} {}", self.payload),
            (true, true) => Ok(()),
        }
    }
}

/// Builder for [`LogMessage`].
#[derive(Debug, Default)]
pub struct LogMessageBuilder {
    priority: Option<Priority>,
    message: String,
    payload: Value,
    schema: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl LogMessageBuilder {
    /// Sets the priority. Defaults to [`Priority::Info`].
    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the text.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the structured payload.
    #[must_use]
    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Tags the message with a schema.
    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the timestamp. Defaults to now.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Builds the message.
    #[must_use]
    pub fn build(self) -> LogMessage {
        LogMessage {
            priority: self.priority.unwrap_or(Priority::Info),
            message: self.message,
            payload: self.payload,
            schema: self.schema,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}
