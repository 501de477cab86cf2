//! The metrics filter: a pass-through sender that captures metric payloads.
//!
//! Every message is forwarded to the destination unchanged. Messages that
//! carry a schema (or, with `capture_all_structured`, any structured
//! payload) are additionally handed to the [`RotatingCollector`] for their
//! schema key, created on first use.
//!
//! The registry lock only guards the schema map. Each schema has its own
//! entry lock, held while its collector starts, so a slow output open
//! never stalls messages for other schemas.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use logsend_core::{
    CloseFuture, ErrorHandler, LevelInfo, Message, SendError, Sender, SenderBase,
};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::debug;

use crate::collector::{CollectorStats, RotatingCollector, SequenceCounter};
use crate::config::CollectorOptions;
use crate::error::{MetricsError, Result};
use crate::sample::shape_key;

/// Per-schema state. Survives restarts so output names keep counting up.
#[derive(Default)]
struct Entry {
    collector: Option<Arc<RotatingCollector>>,
    disabled: bool,
    closed: bool,
    sequence: SequenceCounter,
}

type SharedEntry = Arc<Mutex<Entry>>;

#[derive(Default)]
struct Registry {
    entries: HashMap<String, SharedEntry>,
    closed: bool,
}

/// A [`Sender`] that forwards to a destination and captures metrics on the
/// side.
pub struct MetricsFilter {
    base: Arc<SenderBase>,
    destination: Arc<dyn Sender>,
    options: CollectorOptions,
    runtime: Handle,
    registry: Mutex<Registry>,
}

impl std::fmt::Debug for MetricsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsFilter")
            .field("destination", &self.destination.name())
            .field("options", &self.options)
            .field("schemas", &self.collected_schemas())
            .finish_non_exhaustive()
    }
}

impl MetricsFilter {
    /// Creates a filter in front of `destination`, hosting collector workers
    /// on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if called outside a tokio runtime or the config is
    /// invalid.
    pub fn new(destination: Arc<dyn Sender>, options: CollectorOptions) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| MetricsError::NoRuntime(e.to_string()))?;
        Self::with_runtime(destination, options, runtime)
    }

    /// Creates a filter hosting collector workers on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid.
    pub fn with_runtime(
        destination: Arc<dyn Sender>,
        options: CollectorOptions,
        runtime: Handle,
    ) -> Result<Self> {
        options.config().validate()?;
        Ok(Self {
            base: Arc::new(SenderBase::new(format!("metrics:{}", destination.name()))),
            destination,
            options,
            runtime,
            registry: Mutex::new(Registry::default()),
        })
    }

    /// Returns the collector options.
    #[must_use]
    pub const fn options(&self) -> &CollectorOptions {
        &self.options
    }

    /// Returns the schema key a message would be captured under, if any.
    #[must_use]
    pub fn schema_for(&self, msg: &dyn Message) -> Option<String> {
        if !msg.loggable() {
            return None;
        }
        if let Some(schema) = msg.schema() {
            return Some(schema.to_string());
        }
        if self.options.config().capture_all_structured && msg.structured() {
            return Some(shape_key(msg.raw()));
        }
        None
    }

    /// Returns the schema keys with a live collector, sorted.
    #[must_use]
    pub fn collected_schemas(&self) -> Vec<String> {
        let mut schemas: Vec<String> = self
            .entries()
            .into_iter()
            .filter(|(_, entry)| entry.lock().collector.is_some())
            .map(|(schema, _)| schema)
            .collect();
        schemas.sort();
        schemas
    }

    /// Returns the schema keys whose collector could not be created, sorted.
    #[must_use]
    pub fn disabled_schemas(&self) -> Vec<String> {
        let mut schemas: Vec<String> = self
            .entries()
            .into_iter()
            .filter(|(_, entry)| entry.lock().disabled)
            .map(|(schema, _)| schema)
            .collect();
        schemas.sort();
        schemas
    }

    /// Returns the collector for `schema`, if one is live.
    #[must_use]
    pub fn collector(&self, schema: &str) -> Option<Arc<RotatingCollector>> {
        let entry = self.registry.lock().entries.get(schema).cloned()?;
        entry.lock().collector.clone()
    }

    /// Returns per-schema collector counters.
    #[must_use]
    pub fn stats(&self) -> HashMap<String, CollectorStats> {
        self.live_collectors()
            .into_iter()
            .map(|collector| (collector.schema().to_string(), collector.stats()))
            .collect()
    }

    /// Snapshots the schema map so entry locks are never taken under the
    /// registry lock.
    fn entries(&self) -> Vec<(String, SharedEntry)> {
        self.registry
            .lock()
            .entries
            .iter()
            .map(|(schema, entry)| (schema.clone(), Arc::clone(entry)))
            .collect()
    }

    fn live_collectors(&self) -> Vec<Arc<RotatingCollector>> {
        self.entries()
            .into_iter()
            .filter_map(|(_, entry)| entry.lock().collector.clone())
            .collect()
    }

    /// Forgets a disabled or failed schema so the next message recreates its
    /// collector. A live collector is closed first. The new collector
    /// continues the schema's output sequence.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::FilterClosed`] after close, or the error from
    /// closing the old collector.
    pub async fn restart_schema(&self, schema: &str) -> Result<()> {
        let entry = {
            let registry = self.registry.lock();
            if registry.closed {
                return Err(MetricsError::FilterClosed);
            }
            registry.entries.get(schema).cloned()
        };
        let existing = entry.and_then(|entry| {
            let mut entry = entry.lock();
            entry.disabled = false;
            entry.collector.take()
        });
        debug!(schema, "restarting schema");
        match existing {
            Some(collector) => collector.close().await,
            None => Ok(()),
        }
    }

    fn capture(&self, msg: &dyn Message) {
        let Some(schema) = self.schema_for(msg) else {
            return;
        };

        let entry = {
            let mut registry = self.registry.lock();
            if registry.closed {
                return;
            }
            Arc::clone(registry.entries.entry(schema.clone()).or_default())
        };

        let collector = {
            let mut entry = entry.lock();
            if entry.closed || entry.disabled {
                return;
            }
            if let Some(collector) = &entry.collector {
                Arc::clone(collector)
            } else {
                match RotatingCollector::start_with_sequence(
                    schema.clone(),
                    entry.sequence.clone(),
                    &self.options,
                    &self.runtime,
                    self.collector_error_handler(),
                ) {
                    Ok(collector) => {
                        let collector = Arc::new(collector);
                        entry.collector = Some(Arc::clone(&collector));
                        collector
                    }
                    Err(err) => {
                        entry.disabled = true;
                        drop(entry);
                        debug!(schema = %schema, error = %err, "schema disabled");
                        self.base.report(&err.into(), Some(msg));
                        return;
                    }
                }
            }
        };

        if let Err(err) = collector.add(msg.raw().clone()) {
            debug!(schema = %schema, error = %err, "dropping sample");
        }
    }

    /// Routes collector worker errors to whatever handler is current.
    fn collector_error_handler(&self) -> ErrorHandler {
        let base = Arc::clone(&self.base);
        Arc::new(move |err: &SendError, msg: Option<&dyn Message>| base.report(err, msg))
    }
}

impl Sender for MetricsFilter {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn send(&self, msg: &dyn Message) {
        if self.base.is_closed() {
            self.base
                .report(&SendError::Closed(self.base.name().to_string()), Some(msg));
            return;
        }
        if self.base.should_send(msg) {
            self.capture(msg);
        }
        self.destination.send(msg);
    }

    fn level(&self) -> LevelInfo {
        self.base.level()
    }

    fn set_level(&self, level: LevelInfo) -> logsend_core::Result<()> {
        self.base.set_level(level)
    }

    fn set_error_handler(&self, handler: ErrorHandler) {
        self.base.set_error_handler(handler);
    }

    fn flush(&self) -> logsend_core::Result<()> {
        let collectors = self.live_collectors();
        let mut errors: Vec<SendError> = collectors
            .iter()
            .filter_map(|collector| collector.flush_now().err())
            .map(SendError::from)
            .collect();
        if let Err(err) = self.destination.flush() {
            errors.push(err);
        }
        SendError::join(errors)
    }

    fn close(&self) -> CloseFuture<'_> {
        Box::pin(async move {
            if !self.base.mark_closed() {
                return Ok(());
            }
            let entries: Vec<SharedEntry> = {
                let mut registry = self.registry.lock();
                registry.closed = true;
                registry.entries.drain().map(|(_, entry)| entry).collect()
            };
            // An entry still starting its collector is waited for here.
            let collectors: Vec<Arc<RotatingCollector>> = entries
                .iter()
                .filter_map(|entry| {
                    let mut entry = entry.lock();
                    entry.closed = true;
                    entry.collector.take()
                })
                .collect();
            debug!(collectors = collectors.len(), "closing metrics filter");

            let results = join_all(collectors.iter().map(|c| c.close())).await;
            let mut errors = Vec::new();
            for err in results.into_iter().filter_map(std::result::Result::err) {
                match SendError::from(err) {
                    SendError::Multiple(nested) => errors.extend(nested),
                    err => errors.push(err),
                }
            }
            if let Err(err) = self.destination.close().await {
                errors.push(err);
            }
            SendError::join(errors)
        })
    }
}
