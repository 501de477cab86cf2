//! Core types for message levels.
//!
//! This module provides:
//! - [`Priority`] — Syslog-ordered severity levels
//! - [`LevelInfo`] — A sender's default priority and send threshold

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SendError;
use crate::message::Message;

/// Message priority, ordered from least to most severe.
///
/// `Invalid` is the zero value and is never accepted as a threshold.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Unset or unparseable priority
    #[default]
    Invalid = 0,
    /// Very detailed tracing output
    Trace = 10,
    /// Debugging information
    Debug = 20,
    /// General information
    Info = 30,
    /// Normal but significant conditions
    Notice = 40,
    /// Warning conditions
    Warning = 50,
    /// Error conditions
    Error = 60,
    /// Critical conditions
    Critical = 70,
    /// Action must be taken immediately
    Alert = 80,
    /// System is unusable
    Emergency = 90,
}

impl Priority {
    /// Every usable priority, least severe first.
    pub const ALL: [Self; 9] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Notice,
        Self::Warning,
        Self::Error,
        Self::Critical,
        Self::Alert,
        Self::Emergency,
    ];

    /// Returns true unless this is [`Priority::Invalid`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid)
    }

    /// Returns the string representation of this priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = SendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "notice" => Ok(Self::Notice),
            "warning" | "warn" => Ok(Self::Warning),
            "error" | "err" => Ok(Self::Error),
            "critical" | "crit" => Ok(Self::Critical),
            "alert" => Ok(Self::Alert),
            "emergency" | "emerg" => Ok(Self::Emergency),
            other => Err(SendError::InvalidPriority(other.to_string())),
        }
    }
}

/// Default priority and minimum send threshold for a sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelInfo {
    /// Priority assigned to messages that do not carry one
    pub default: Priority,
    /// Messages below this priority are not sent
    pub threshold: Priority,
}

impl Default for LevelInfo {
    fn default() -> Self {
        Self {
            default: Priority::Info,
            threshold: Priority::Trace,
        }
    }
}

impl LevelInfo {
    /// Creates a level with the given default and threshold.
    #[must_use]
    pub const fn new(default: Priority, threshold: Priority) -> Self {
        Self { default, threshold }
    }

    /// Checks that both priorities are usable.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::InvalidPriority`] if either priority is `Invalid`.
    pub fn validate(&self) -> Result<(), SendError> {
        if !self.default.is_valid() {
            return Err(SendError::InvalidPriority("default priority is unset".to_string()));
        }
        if !self.threshold.is_valid() {
            return Err(SendError::InvalidPriority("threshold is unset".to_string()));
        }
        Ok(())
    }

    /// Returns true if the message is loggable and at or above the threshold.
    #[must_use]
    pub fn should_send(&self, msg: &dyn Message) -> bool {
        msg.loggable() && msg.priority() >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::LogMessage;
    use test_case::test_case;

    #[test]
    fn priority_ordering() {
        assert!(Priority::Trace < Priority::Debug);
        assert!(Priority::Warning < Priority::Error);
        assert!(Priority::Alert < Priority::Emergency);
        assert!(Priority::Invalid < Priority::Trace);
    }

    #[test_case("info", Priority::Info)]
    #[test_case("WARN", Priority::Warning)]
    #[test_case(" crit ", Priority::Critical)]
    #[test_case("emerg", Priority::Emergency)]
    #[test_case("err", Priority::Error)]
    fn priority_parses(input: &str, expected: Priority) {
        assert_eq!(input.parse::<Priority>().ok(), Some(expected));
    }

    #[test]
    fn priority_parse_rejects_unknown() {
        let err = "loud".parse::<Priority>();
        assert!(matches!(err, Err(SendError::InvalidPriority(s)) if s == "loud"));
    }

    #[test]
    fn priority_display_round_trips_through_parse() {
        for priority in Priority::ALL {
            assert_eq!(priority.to_string().parse::<Priority>().ok(), Some(priority));
        }
    }

    #[test]
    fn priority_serde_lowercase() {
        let json = serde_json::to_string(&Priority::Notice).unwrap_or_default();
        assert_eq!(json, "\"notice\"");
    }

    #[test]
    fn level_info_validate() {
        assert!(LevelInfo::default().validate().is_ok());
        assert!(LevelInfo::new(Priority::Invalid, Priority::Info).validate().is_err());
        assert!(LevelInfo::new(Priority::Info, Priority::Invalid).validate().is_err());
    }

    #[test]
    fn level_info_threshold_filters() {
        let level = LevelInfo::new(Priority::Info, Priority::Warning);
        assert!(!level.should_send(&LogMessage::new(Priority::Info, "quiet")));
        assert!(level.should_send(&LogMessage::new(Priority::Error, "loud")));
        assert!(!level.should_send(&LogMessage::new(Priority::Error, "   ")));
    }
}
