//! An in-memory sender that keeps every message it accepts.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Result, SendError};
use crate::message::Message;
use crate::sender::{CloseFuture, ErrorHandler, Sender, SenderBase};
use crate::types::{LevelInfo, Priority};

/// A snapshot of a message accepted by [`MemorySender`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedMessage {
    /// Message priority
    pub priority: Priority,
    /// Rendered text
    pub text: String,
    /// Raw payload
    pub payload: Value,
    /// Schema tag, if any
    pub schema: Option<String>,
    /// When the sender accepted the message
    pub received_at: DateTime<Utc>,
}

/// Captures messages in memory.
#[derive(Debug)]
pub struct MemorySender {
    base: SenderBase,
    messages: Mutex<Vec<CapturedMessage>>,
    close_calls: AtomicUsize,
}

impl MemorySender {
    /// Creates an empty in-memory sender.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: SenderBase::new(name),
            messages: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Returns a copy of every captured message, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<CapturedMessage> {
        self.messages.lock().clone()
    }

    /// Removes and returns every captured message.
    pub fn drain(&self) -> Vec<CapturedMessage> {
        std::mem::take(&mut *self.messages.lock())
    }

    /// Returns the number of captured messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Returns true if nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Returns how many times [`Sender::close`] was called.
    #[must_use]
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Returns true once the sender has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.base.is_closed()
    }
}

impl Sender for MemorySender {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn send(&self, msg: &dyn Message) {
        if !self.base.should_send(msg) {
            return;
        }
        if self.base.is_closed() {
            self.base
                .report(&SendError::Closed(self.base.name().to_string()), Some(msg));
            return;
        }

        self.messages.lock().push(CapturedMessage {
            priority: msg.priority(),
            text: msg.to_string(),
            payload: msg.raw().clone(),
            schema: msg.schema().map(str::to_string),
            received_at: Utc::now(),
        });
    }

    fn level(&self) -> LevelInfo {
        self.base.level()
    }

    fn set_level(&self, level: LevelInfo) -> Result<()> {
        self.base.set_level(level)
    }

    fn set_error_handler(&self, handler: ErrorHandler) {
        self.base.set_error_handler(handler);
    }

    fn close(&self) -> CloseFuture<'_> {
        Box::pin(async move {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            self.base.mark_closed();
            Ok(())
        })
    }
}
