//! The [`Sender`] trait and shared sender plumbing.
//!
//! Senders never return errors from [`Sender::send`]; runtime failures are
//! handed to the configured [`ErrorHandler`] so the caller is never blocked
//! or failed by a destination problem.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::{Result, SendError};
use crate::message::Message;
use crate::types::LevelInfo;

/// Callback receiving runtime errors, with the message that caused them if any.
pub type ErrorHandler = Arc<dyn Fn(&SendError, Option<&dyn Message>) + Send + Sync>;

/// Future returned by [`Sender::close`].
pub type CloseFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Returns an error handler that logs through `tracing`.
#[must_use]
pub fn log_error_handler() -> ErrorHandler {
    Arc::new(|err: &SendError, msg: Option<&dyn Message>| match msg {
        Some(msg) => tracing::error!(
            error = %err,
            priority = %msg.priority(),
            message = %msg,
            "send failed"
        ),
        None => tracing::error!(error = %err, "send failed"),
    })
}

/// A destination for messages.
pub trait Sender: Send + Sync {
    /// Returns the sender's name, used in logs and errors.
    fn name(&self) -> &str;

    /// Sends a message. Failures are reported to the error handler.
    fn send(&self, msg: &dyn Message);

    /// Returns the current level configuration.
    fn level(&self) -> LevelInfo;

    /// Replaces the level configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the level is invalid.
    fn set_level(&self, level: LevelInfo) -> Result<()>;

    /// Replaces the error handler.
    fn set_error_handler(&self, handler: ErrorHandler);

    /// Flushes any buffered output.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be flushed.
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Closes the sender, releasing its resources.
    ///
    /// Closing twice is a no-op; only the first call reports errors.
    fn close(&self) -> CloseFuture<'_>;
}

impl<S: Sender + ?Sized> Sender for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn send(&self, msg: &dyn Message) {
        (**self).send(msg);
    }

    fn level(&self) -> LevelInfo {
        (**self).level()
    }

    fn set_level(&self, level: LevelInfo) -> Result<()> {
        (**self).set_level(level)
    }

    fn set_error_handler(&self, handler: ErrorHandler) {
        (**self).set_error_handler(handler);
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn close(&self) -> CloseFuture<'_> {
        (**self).close()
    }
}

/// State every sender carries: name, level, error handler and closed flag.
pub struct SenderBase {
    name: String,
    level: RwLock<LevelInfo>,
    handler: RwLock<ErrorHandler>,
    closed: AtomicBool,
}

impl std::fmt::Debug for SenderBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderBase")
            .field("name", &self.name)
            .field("level", &*self.level.read())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl SenderBase {
    /// Creates sender state with the default level and a logging error handler.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: RwLock::new(LevelInfo::default()),
            handler: RwLock::new(log_error_handler()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the sender name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current level.
    #[must_use]
    pub fn level(&self) -> LevelInfo {
        *self.level.read()
    }

    /// Validates and stores a new level.
    ///
    /// # Errors
    ///
    /// Returns an error if the level is invalid.
    pub fn set_level(&self, level: LevelInfo) -> Result<()> {
        level.validate()?;
        *self.level.write() = level;
        Ok(())
    }

    /// Stores a new error handler.
    pub fn set_error_handler(&self, handler: ErrorHandler) {
        *self.handler.write() = handler;
    }

    /// Returns a handle to the current error handler.
    #[must_use]
    pub fn error_handler(&self) -> ErrorHandler {
        Arc::clone(&*self.handler.read())
    }

    /// Hands an error to the current error handler.
    pub fn report(&self, err: &SendError, msg: Option<&dyn Message>) {
        let handler = self.error_handler();
        handler(err, msg);
    }

    /// Returns true if the message passes the level threshold.
    #[must_use]
    pub fn should_send(&self, msg: &dyn Message) -> bool {
        self.level.read().should_send(msg)
    }

    /// Marks the sender closed. Returns true only for the first call.
    pub fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Returns true once the sender has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::LogMessage;
    use crate::types::Priority;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn base_defaults() {
        let base = SenderBase::new("test");
        assert_eq!(base.name(), "test");
        assert_eq!(base.level(), LevelInfo::default());
        assert!(!base.is_closed());
    }

    #[test]
    fn base_rejects_invalid_level() {
        let base = SenderBase::new("test");
        let result = base.set_level(LevelInfo::new(Priority::Info, Priority::Invalid));
        assert!(result.is_err());
        assert_eq!(base.level(), LevelInfo::default());
    }

    #[test]
    fn base_mark_closed_once() {
        let base = SenderBase::new("test");
        assert!(base.mark_closed());
        assert!(!base.mark_closed());
        assert!(base.is_closed());
    }

    #[test]
    fn base_reports_to_custom_handler() {
        let base = SenderBase::new("test");
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        base.set_error_handler(Arc::new(move |err: &SendError, msg: Option<&dyn Message>| {
            assert!(matches!(err, SendError::Closed(_)));
            assert!(msg.is_some());
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let msg = LogMessage::new(Priority::Info, "dropped");
        base.report(&SendError::Closed("test".to_string()), Some(&msg));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn base_should_send_respects_threshold() {
        let base = SenderBase::new("test");
        assert!(base.set_level(LevelInfo::new(Priority::Info, Priority::Error)).is_ok());
        assert!(!base.should_send(&LogMessage::new(Priority::Warning, "no")));
        assert!(base.should_send(&LogMessage::new(Priority::Critical, "yes")));
    }
}
