//! # logsend-core
//!
//! Message and sender abstractions shared by logsend destinations.
//!
//! This crate provides:
//!
//! - [`Message`] — What a sender consumes: priority, payload, schema tag
//! - [`LogMessage`] — General-purpose message with an optional JSON payload
//! - [`Priority`] / [`LevelInfo`] — Severity levels and send thresholds
//! - [`Sender`] — The destination trait, with [`SenderBase`] for shared state
//! - [`WriterSender`] — Renders messages as lines onto any `io::Write`
//! - [`MemorySender`] — Captures messages in memory
//!
//! ## Example
//!
//! ```rust
//! use logsend_core::{LogMessage, MemorySender, Priority, Sender};
//! use serde_json::json;
//!
//! let sender = MemorySender::new("capture");
//! sender.send(&LogMessage::metric(Priority::Info, "cpu", json!({"user": 0.42})));
//!
//! let captured = sender.messages();
//! assert_eq!(captured[0].schema.as_deref(), Some("cpu"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod memory;
pub mod message;
pub mod sender;
pub mod types;
pub mod writer;

// Re-export main types
pub use error::{Result, SendError};
pub use memory::{CapturedMessage, MemorySender};
pub use message::{LogMessage, LogMessageBuilder, Message};
pub use sender::{CloseFuture, ErrorHandler, Sender, SenderBase, log_error_handler};
pub use types::{LevelInfo, Priority};
pub use writer::WriterSender;
