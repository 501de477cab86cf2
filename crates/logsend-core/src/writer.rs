//! A sender that renders messages as text lines onto any [`Write`].

use std::io::Write;

use parking_lot::Mutex;

use crate::error::{Result, SendError};
use crate::message::Message;
use crate::sender::{CloseFuture, ErrorHandler, Sender, SenderBase};
use crate::types::LevelInfo;

/// Writes one `[p=<priority>] <message>` line per message.
pub struct WriterSender<W> {
    base: SenderBase,
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSender<W> {
    /// Creates a sender writing to `writer`.
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            base: SenderBase::new(name),
            writer: Mutex::new(writer),
        }
    }

    /// Runs `f` with exclusive access to the underlying writer.
    pub fn with_writer<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.writer.lock())
    }

    /// Consumes the sender, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> Sender for WriterSender<W> {
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

        let result = writeln!(self.writer.lock(), "[p={}] {}", msg.priority(), msg);
        if let Err(err) = result {
            self.base.report(&SendError::Io(err), Some(msg));
        }
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

    fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }

    fn close(&self) -> CloseFuture<'_> {
        Box::pin(async move {
            if !self.base.mark_closed() {
                return Ok(());
            }
            self.writer.lock().flush()?;
            Ok(())
        })
    }
}
