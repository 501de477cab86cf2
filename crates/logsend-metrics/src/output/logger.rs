//! Publishing through an existing sender.

use std::io::{self, Write};
use std::sync::Arc;

use logsend_core::{LogMessage, Priority, Sender};

use super::{OutputBackend, Publish};
use crate::error::Result;

/// An [`io::Write`] adapter that sends one message per line.
///
/// Bytes are buffered until a newline; `flush` sends whatever partial line
/// remains. Blank lines are dropped.
pub struct SenderWriter {
    sender: Arc<dyn Sender>,
    priority: Priority,
    buffer: Vec<u8>,
}

impl std::fmt::Debug for SenderWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderWriter")
            .field("sender", &self.sender.name())
            .field("priority", &self.priority)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl SenderWriter {
    /// Creates a writer sending at `priority`.
    #[must_use]
    pub fn new(sender: Arc<dyn Sender>, priority: Priority) -> Self {
        Self {
            sender,
            priority,
            buffer: Vec::new(),
        }
    }

    /// Returns the priority lines are sent at.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    fn emit(&self, line: &[u8]) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let text = String::from_utf8_lossy(line);
        if text.trim().is_empty() {
            return;
        }
        self.sender
            .send(&LogMessage::new(self.priority, text.into_owned()));
    }
}

impl Write for SenderWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.emit(&line[..pos]);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.emit(&line);
        }
        self.sender
            .flush()
            .map_err(io::Error::other)
    }
}

impl Drop for SenderWriter {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.emit(&line);
        }
    }
}

/// An [`OutputBackend`] that republishes items as log messages.
#[derive(Debug)]
pub struct LoggerBackend {
    writer: SenderWriter,
}

impl LoggerBackend {
    /// Creates a backend sending through `sender` at `priority`.
    #[must_use]
    pub fn new(sender: Arc<dyn Sender>, priority: Priority) -> Self {
        Self {
            writer: SenderWriter::new(sender, priority),
        }
    }
}

impl OutputBackend for LoggerBackend {
    fn publish(&mut self, item: &dyn Publish) -> Result<u64> {
        Ok(item.publish(&mut self.writer)?)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::persist;
    use crate::sample::Sample;
    use logsend_core::MemorySender;
    use serde_json::json;

    fn writer() -> (SenderWriter, Arc<MemorySender>) {
        let sender = Arc::new(MemorySender::new("mem"));
        let dyn_sender: Arc<dyn Sender> = sender.clone();
        (SenderWriter::new(dyn_sender, Priority::Notice), sender)
    }

    #[test]
    fn one_message_per_line() {
        let (mut writer, sender) = writer();
        assert!(writer.write_all(b"first\nsec").is_ok());
        assert!(writer.write_all(b"ond\r\n\nthird").is_ok());

        let texts: Vec<String> = sender.messages().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["first".to_string(), "second".to_string()]);
        assert!(sender.messages().iter().all(|m| m.priority == Priority::Notice));

        assert!(writer.flush().is_ok());
        assert_eq!(sender.len(), 3);
        assert_eq!(sender.messages()[2].text, "third");
    }

    #[test]
    fn drop_sends_partial_line() {
        let (mut writer, sender) = writer();
        assert!(writer.write_all(b"tail").is_ok());
        drop(writer);
        assert_eq!(sender.len(), 1);
    }

    #[test]
    fn backend_sends_each_sample() {
        let sender = Arc::new(MemorySender::new("mem"));
        let mut backend = LoggerBackend::new(sender.clone(), Priority::Info);

        let samples = (0..3).map(|i| Sample::new(json!({"i": i})));
        let stats = persist(&mut backend, samples).unwrap_or_default();
        assert!(backend.close().is_ok());

        assert_eq!(stats.items, 3);
        let messages = sender.messages();
        assert_eq!(messages.len(), 3);
        assert!(messages[1].text.contains(r#""payload":{"i":1}"#));
    }
}
