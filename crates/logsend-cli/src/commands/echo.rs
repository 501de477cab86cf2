//! Echo command implementation.

use std::io::BufRead;
use std::sync::Arc;

use logsend_core::Sender;
use logsend_metrics::{LoggerBackend, OutputBackend, persist};
use tracing::debug;

use super::PayloadLines;
use crate::cli::EchoArgs;
use crate::error::CliError;

/// Echo command executor.
#[derive(Debug, Clone)]
pub struct EchoCommand {
    args: EchoArgs,
}

impl EchoCommand {
    /// Create a new echo command.
    #[must_use]
    pub const fn new(args: EchoArgs) -> Self {
        Self { args }
    }

    /// Republishes every payload of `input` as one message on `destination`,
    /// then closes it. Returns the number of payloads sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read or the destination fails
    /// to flush or close.
    pub async fn execute<R: BufRead>(&self, input: R, destination: Arc<dyn Sender>) -> Result<usize, CliError> {
        let mut backend = LoggerBackend::new(Arc::clone(&destination), self.args.priority);
        let mut payloads = PayloadLines::new(input);
        let persisted = persist(&mut backend, &mut payloads);
        let closed = backend.close();
        drop(backend);
        destination.close().await?;

        persisted?;
        closed?;
        if let Some(err) = payloads.take_error() {
            return Err(err.into());
        }
        debug!(sent = payloads.read(), skipped = payloads.skipped(), "echo finished");
        Ok(payloads.read())
    }
}
