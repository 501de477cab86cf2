//! Per-schema rotating collector.
//!
//! A [`RotatingCollector`] buffers samples for one schema key and owns a
//! background worker that, on every tick of the flush interval, packs the
//! buffered samples into blocks and appends them to the current output
//! sink. After `block_count` blocks the sink is closed; the next block
//! opens a replacement named with the next sequence number.
//!
//! Sequence numbers come from a [`SequenceCounter`] that outlives any one
//! collector, so a restarted schema continues where the previous collector
//! stopped. Names the sink factory reports as already existing are skipped.
//!
//! ```text
//! Open ──tick──▶ Flushing ──(block_count reached)──▶ Rotating ──▶ Open
//!   │                │
//!   │                └──I/O error──▶ Failed
//!   └──cancel──▶ Closing (final flush, sink close) ──▶ Closed
//! ```

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use logsend_core::{ErrorHandler, SendError};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::block::Block;
use crate::config::{CollectorConfig, CollectorOptions};
use crate::error::{MetricsError, Result};
use crate::sample::Sample;
use crate::sink::{OutputSink, SinkFactory};

/// Lifecycle state of a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorState {
    /// Accepting samples.
    Open,
    /// A flush failed; the worker stopped and samples are refused.
    Failed,
    /// Shut down; samples are refused.
    Closed,
}

/// Counters describing what a collector has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectorStats {
    /// Samples accepted by [`RotatingCollector::add`]
    pub samples_added: u64,
    /// Samples written inside blocks
    pub samples_written: u64,
    /// Blocks written
    pub blocks_written: u64,
    /// Sinks opened
    pub files_opened: u64,
    /// Sinks closed
    pub files_closed: u64,
}

struct Pending {
    samples: Vec<Sample>,
    state: CollectorState,
}

/// Hands out output sequence numbers for one schema key.
///
/// Clones share the counter. A number is never handed out twice.
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter(Arc<AtomicU64>);

impl SequenceCounter {
    /// Creates a counter starting at 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number the next output will try.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Rotation state, guarded by the output lock.
struct Output {
    sink: Option<Box<dyn OutputSink>>,
    blocks_in_file: usize,
    stats: CollectorStats,
}

struct Shared {
    schema: String,
    config: CollectorConfig,
    factory: SinkFactory,
    sequence: SequenceCounter,
    pending: Mutex<Pending>,
    output: Mutex<Output>,
    samples_added: AtomicU64,
}

impl Shared {
    fn state(&self) -> CollectorState {
        self.pending.lock().state
    }

    fn mark_failed(&self) {
        let mut pending = self.pending.lock();
        if pending.state == CollectorState::Open {
            pending.state = CollectorState::Failed;
        }
        pending.samples.clear();
    }

    /// Writes every pending sample. With `last` set the collector stops
    /// accepting samples in the same critical section that drains them.
    fn flush(&self, last: bool) -> Result<()> {
        let mut output = self.output.lock();
        let samples = {
            let mut pending = self.pending.lock();
            if pending.state == CollectorState::Failed {
                return Ok(());
            }
            if last {
                pending.state = CollectorState::Closed;
            }
            std::mem::take(&mut pending.samples)
        };

        let mut samples = samples.into_iter();
        loop {
            let chunk: Vec<Sample> = samples.by_ref().take(self.config.sample_count).collect();
            if chunk.is_empty() {
                break;
            }
            self.write_block(&mut output, &Block::new(chunk))?;
        }

        if let Some(sink) = output.sink.as_mut() {
            sink.flush().map_err(|source| MetricsError::Flush {
                schema: self.schema.clone(),
                source,
            })?;
        }
        Ok(())
    }

    fn write_block(&self, output: &mut Output, block: &Block) -> Result<()> {
        if output.sink.is_none() {
            self.open_next(output)?;
        }
        let Some(sink) = output.sink.as_mut() else {
            return Err(MetricsError::CollectorStopped(self.schema.clone()));
        };
        block
            .write_to(sink)
            .map_err(|source| MetricsError::Flush {
                schema: self.schema.clone(),
                source,
            })?;

        output.blocks_in_file += 1;
        output.stats.blocks_written += 1;
        output.stats.samples_written += block.len() as u64;

        if output.blocks_in_file >= self.config.block_count {
            self.close_sink(output)?;
        }
        Ok(())
    }

    fn open_next(&self, output: &mut Output) -> Result<()> {
        let (sequence, name, sink) = loop {
            let sequence = self.sequence.next();
            let name = self.config.output_name(&self.schema, sequence);
            match (self.factory)(&name) {
                Ok(sink) => break (sequence, name, sink),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(schema = %self.schema, name = %name, "output exists, skipping");
                }
                Err(source) => return Err(MetricsError::SinkOpen { name, source }),
            }
        };
        debug!(
            schema = %self.schema,
            sequence,
            name = %name,
            "opened collector output"
        );
        output.blocks_in_file = 0;
        output.stats.files_opened += 1;
        output.sink = Some(sink);
        Ok(())
    }

    /// Closes the current sink, if any. The next block opens a new one.
    fn close_sink(&self, output: &mut Output) -> Result<()> {
        let Some(sink) = output.sink.take() else {
            return Ok(());
        };
        output.stats.files_closed += 1;
        debug!(
            schema = %self.schema,
            blocks = output.blocks_in_file,
            "closed collector output"
        );
        output.blocks_in_file = 0;
        sink.close().map_err(|source| MetricsError::SinkClose {
            schema: self.schema.clone(),
            source,
        })
    }

    /// Final flush followed by closing the sink. The sink is closed even
    /// when the flush fails.
    fn shutdown(&self) -> Result<()> {
        let flushed = self.flush(true);
        let released = self.release();
        MetricsError::join([flushed.err(), released.err()].into_iter().flatten())
    }

    /// Marks the collector closed and closes the sink without flushing.
    fn release(&self) -> Result<()> {
        let mut output = self.output.lock();
        {
            let mut pending = self.pending.lock();
            if pending.state == CollectorState::Open {
                pending.state = CollectorState::Closed;
            }
        }
        self.close_sink(&mut output)
    }

    fn stats(&self) -> CollectorStats {
        CollectorStats {
            samples_added: self.samples_added.load(Ordering::Relaxed),
            ..self.output.lock().stats
        }
    }
}

/// Accumulates samples for one schema key and persists them as rotating
/// block files.
pub struct RotatingCollector {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl std::fmt::Debug for RotatingCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingCollector")
            .field("schema", &self.shared.schema)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl RotatingCollector {
    /// Opens the first output for `schema` and spawns the flush worker on
    /// `runtime`.
    ///
    /// Flush failures are handed to `on_error`, after which the worker stops.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the first output cannot
    /// be opened. Nothing is spawned in that case.
    pub fn start(
        schema: impl Into<String>,
        options: &CollectorOptions,
        runtime: &Handle,
        on_error: ErrorHandler,
    ) -> Result<Self> {
        Self::start_with_sequence(schema, SequenceCounter::new(), options, runtime, on_error)
    }

    /// Like [`start`](Self::start), drawing output sequence numbers from
    /// `sequence`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the first output cannot
    /// be opened.
    pub fn start_with_sequence(
        schema: impl Into<String>,
        sequence: SequenceCounter,
        options: &CollectorOptions,
        runtime: &Handle,
        on_error: ErrorHandler,
    ) -> Result<Self> {
        let config = options.config().clone();
        config.validate()?;

        let shared = Arc::new(Shared {
            schema: schema.into(),
            config,
            factory: Arc::clone(options.sink_factory()),
            sequence,
            pending: Mutex::new(Pending {
                samples: Vec::new(),
                state: CollectorState::Open,
            }),
            output: Mutex::new(Output {
                sink: None,
                blocks_in_file: 0,
                stats: CollectorStats::default(),
            }),
            samples_added: AtomicU64::new(0),
        });
        shared.open_next(&mut shared.output.lock())?;

        let cancel = CancellationToken::new();
        let worker = runtime.spawn(run_worker(
            Arc::clone(&shared),
            cancel.clone(),
            shared.config.flush_interval,
            on_error,
        ));
        debug!(schema = %shared.schema, "collector started");

        Ok(Self {
            shared,
            cancel,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Returns the schema key.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.shared.schema
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> CollectorState {
        self.shared.state()
    }

    /// Returns the counters.
    #[must_use]
    pub fn stats(&self) -> CollectorStats {
        self.shared.stats()
    }

    /// Returns the sequence number the next output will try.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.shared.sequence.peek()
    }

    /// Returns the number of samples waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().samples.len()
    }

    /// Buffers a payload. Never touches the output.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::CollectorStopped`] once the collector has
    /// failed or closed.
    pub fn add(&self, payload: Value) -> Result<()> {
        let mut pending = self.shared.pending.lock();
        if pending.state != CollectorState::Open {
            return Err(MetricsError::CollectorStopped(self.shared.schema.clone()));
        }
        pending.samples.push(Sample::new(payload));
        self.shared.samples_added.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Flushes pending samples on the calling thread.
    ///
    /// A failure moves the collector to [`CollectorState::Failed`].
    ///
    /// # Errors
    ///
    /// Returns the flush error.
    pub fn flush_now(&self) -> Result<()> {
        let result = self.shared.flush(false);
        if result.is_err() {
            self.shared.mark_failed();
        }
        result
    }

    /// Stops the worker, flushes what is pending and closes the output.
    ///
    /// Only the first call does any work.
    ///
    /// # Errors
    ///
    /// Returns every flush or close error, joined with
    /// [`MetricsError::join`].
    pub async fn close(&self) -> Result<()> {
        self.cancel.cancel();
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return Ok(());
        };

        let mut errors = Vec::new();
        match worker.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => errors.push(err),
            Err(err) => errors.push(MetricsError::Worker(err.to_string())),
        }

        // A worker that stopped after a failure leaves its sink open.
        let shared = Arc::clone(&self.shared);
        match tokio::task::spawn_blocking(move || shared.release()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => errors.push(err),
            Err(err) => errors.push(MetricsError::Worker(err.to_string())),
        }

        debug!(schema = %self.shared.schema, stats = ?self.stats(), "collector closed");
        MetricsError::join(errors)
    }
}

impl Drop for RotatingCollector {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    cancel: CancellationToken,
    interval: Duration,
    on_error: ErrorHandler,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let shared = Arc::clone(&shared);
                return tokio::task::spawn_blocking(move || shared.shutdown())
                    .await
                    .map_err(|e| MetricsError::Worker(e.to_string()))?;
            }
            _ = ticker.tick() => {
                let task = Arc::clone(&shared);
                let result = tokio::task::spawn_blocking(move || task.flush(false))
                    .await
                    .map_err(|e| MetricsError::Worker(e.to_string()))
                    .and_then(|flushed| flushed);
                if let Err(err) = result {
                    shared.mark_failed();
                    debug!(schema = %shared.schema, error = %err, "collector worker stopped");
                    on_error(&SendError::from(err), None);
                    return Ok(());
                }
                if shared.state() != CollectorState::Open {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockReader;
    use crate::sink::MemorySinks;
    use logsend_core::Message;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn options(sinks: &MemorySinks, interval: Duration) -> CollectorOptions {
        let config = CollectorConfig::new("unused")
            .with_flush_interval(interval)
            .with_sample_count(10)
            .with_block_count(2)
            .with_file_prefix("t");
        CollectorOptions::with_sink_factory(config, sinks.factory())
            .unwrap_or_else(|e| panic!("options: {e}"))
    }

    fn counting_handler() -> (ErrorHandler, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let handler: ErrorHandler = Arc::new(move |_err: &SendError, _msg: Option<&dyn Message>| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (handler, count)
    }

    fn samples_in(bytes: &[u8]) -> usize {
        BlockReader::new(bytes)
            .map(|block| block.map(|b| b.len()).unwrap_or_default())
            .sum()
    }

    #[tokio::test]
    async fn opens_first_output_on_start() {
        let sinks = MemorySinks::new();
        let (handler, _) = counting_handler();
        let collector = RotatingCollector::start(
            "cpu",
            &options(&sinks, Duration::from_secs(60)),
            &Handle::current(),
            handler,
        )
        .unwrap_or_else(|e| panic!("start: {e}"));

        assert_eq!(sinks.opened(), 1);
        assert_eq!(sinks.records()[0].name, "t.cpu.0");
        assert!(collector.close().await.is_ok());
    }

    #[tokio::test]
    async fn start_fails_when_output_cannot_open() {
        let sinks = MemorySinks::new();
        sinks.fail_opens(true);
        let (handler, _) = counting_handler();
        let result = RotatingCollector::start(
            "cpu",
            &options(&sinks, Duration::from_secs(60)),
            &Handle::current(),
            handler,
        );
        assert!(matches!(result, Err(MetricsError::SinkOpen { .. })));
    }

    #[tokio::test]
    async fn add_only_buffers() {
        let sinks = MemorySinks::new();
        let (handler, _) = counting_handler();
        let collector = RotatingCollector::start(
            "cpu",
            &options(&sinks, Duration::from_secs(60)),
            &Handle::current(),
            handler,
        )
        .unwrap_or_else(|e| panic!("start: {e}"));

        for i in 0..15 {
            assert!(collector.add(json!({"i": i})).is_ok());
        }
        assert_eq!(collector.pending(), 15);
        assert!(sinks.records()[0].bytes.is_empty());
        assert!(collector.close().await.is_ok());
    }

    #[tokio::test]
    async fn flush_packs_blocks_and_rotates() {
        let sinks = MemorySinks::new();
        let (handler, _) = counting_handler();
        let collector = RotatingCollector::start(
            "cpu",
            &options(&sinks, Duration::from_secs(60)),
            &Handle::current(),
            handler,
        )
        .unwrap_or_else(|e| panic!("start: {e}"));

        for i in 0..25 {
            assert!(collector.add(json!({"i": i})).is_ok());
        }
        assert!(collector.flush_now().is_ok());

        // 25 samples -> blocks of 10, 10, 5; two blocks per file.
        let stats = collector.stats();
        assert_eq!(stats.blocks_written, 3);
        assert_eq!(stats.samples_written, 25);
        assert_eq!(stats.files_opened, 2);
        assert_eq!(stats.files_closed, 1);

        assert!(collector.close().await.is_ok());
        let records = sinks.records();
        assert_eq!(records.len(), 2);
        assert_eq!(samples_in(&records[0].bytes), 20);
        assert_eq!(samples_in(&records[1].bytes), 5);
        assert!(records.iter().all(|r| r.closes == 1));
    }

    #[tokio::test]
    async fn rotation_opens_next_output_lazily() {
        let sinks = MemorySinks::new();
        let (handler, _) = counting_handler();
        let collector = RotatingCollector::start(
            "cpu",
            &options(&sinks, Duration::from_secs(60)),
            &Handle::current(),
            handler,
        )
        .unwrap_or_else(|e| panic!("start: {e}"));

        for i in 0..20 {
            assert!(collector.add(json!({"i": i})).is_ok());
        }
        assert!(collector.close().await.is_ok());

        let names: Vec<String> = sinks.records().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["t.cpu.0".to_string()]);
    }

    #[tokio::test]
    async fn worker_flushes_on_tick() {
        let sinks = MemorySinks::new();
        let (handler, _) = counting_handler();
        let collector = RotatingCollector::start(
            "cpu",
            &options(&sinks, Duration::from_millis(10)),
            &Handle::current(),
            handler,
        )
        .unwrap_or_else(|e| panic!("start: {e}"));

        for i in 0..3 {
            assert!(collector.add(json!({"i": i})).is_ok());
        }
        for _ in 0..200 {
            if collector.stats().samples_written == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(collector.stats().samples_written, 3);
        assert_eq!(collector.pending(), 0);
        assert!(collector.close().await.is_ok());
    }

    #[tokio::test]
    async fn close_flushes_and_rejects_new_samples() {
        let sinks = MemorySinks::new();
        let (handler, _) = counting_handler();
        let collector = RotatingCollector::start(
            "cpu",
            &options(&sinks, Duration::from_secs(60)),
            &Handle::current(),
            handler,
        )
        .unwrap_or_else(|e| panic!("start: {e}"));

        assert!(collector.add(json!({"v": 1})).is_ok());
        assert!(collector.close().await.is_ok());
        assert_eq!(collector.state(), CollectorState::Closed);
        assert_eq!(collector.stats().samples_written, 1);
        assert!(matches!(
            collector.add(json!({"v": 2})),
            Err(MetricsError::CollectorStopped(_))
        ));

        // Second close does nothing.
        assert!(collector.close().await.is_ok());
        assert_eq!(sinks.records()[0].closes, 1);
    }

    #[tokio::test]
    async fn tick_failure_stops_worker_and_reports() {
        let sinks = MemorySinks::new();
        let (handler, errors) = counting_handler();
        let collector = RotatingCollector::start(
            "cpu",
            &options(&sinks, Duration::from_millis(10)),
            &Handle::current(),
            handler,
        )
        .unwrap_or_else(|e| panic!("start: {e}"));

        sinks.fail_writes(true);
        assert!(collector.add(json!({"v": 1})).is_ok());
        for _ in 0..200 {
            if collector.state() == CollectorState::Failed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(collector.state(), CollectorState::Failed);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(collector.add(json!({"v": 2})).is_err());

        // The failed collector still releases its output on close.
        assert!(collector.close().await.is_ok());
        assert_eq!(sinks.records()[0].closes, 1);
    }

    #[tokio::test]
    async fn skips_output_names_already_taken() {
        let sinks = MemorySinks::new();
        let earlier = sinks.factory()("t.cpu.0").unwrap_or_else(|e| panic!("open: {e}"));
        assert!(earlier.close().is_ok());
        let (handler, _) = counting_handler();
        let collector = RotatingCollector::start(
            "cpu",
            &options(&sinks, Duration::from_secs(60)),
            &Handle::current(),
            handler,
        )
        .unwrap_or_else(|e| panic!("start: {e}"));

        assert!(collector.add(json!({"v": 1})).is_ok());
        assert!(collector.close().await.is_ok());

        let records = sinks.records();
        assert_eq!(records[1].name, "t.cpu.1");
        assert_eq!(samples_in(&records[1].bytes), 1);
        assert!(records[0].bytes.is_empty());
        assert_eq!(collector.next_sequence(), 2);
    }

    #[tokio::test]
    async fn shared_sequence_is_never_reused() {
        let sinks = MemorySinks::new();
        let sequence = SequenceCounter::new();

        for count in [25, 3] {
            let (handler, _) = counting_handler();
            let collector = RotatingCollector::start_with_sequence(
                "cpu",
                sequence.clone(),
                &options(&sinks, Duration::from_secs(60)),
                &Handle::current(),
                handler,
            )
            .unwrap_or_else(|e| panic!("start: {e}"));
            for i in 0..count {
                assert!(collector.add(json!({"i": i})).is_ok());
            }
            assert!(collector.close().await.is_ok());
        }

        // 25 samples at two blocks per file fill t.cpu.0 and t.cpu.1.
        let names: Vec<String> = sinks.records().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["t.cpu.0", "t.cpu.1", "t.cpu.2"]);
        assert_eq!(sequence.peek(), 3);
    }

    #[tokio::test]
    async fn close_returns_every_error() {
        let sinks = MemorySinks::new();
        let (handler, _) = counting_handler();
        let collector = RotatingCollector::start(
            "cpu",
            &options(&sinks, Duration::from_secs(60)),
            &Handle::current(),
            handler,
        )
        .unwrap_or_else(|e| panic!("start: {e}"));

        assert!(collector.add(json!({"v": 1})).is_ok());
        sinks.fail_writes(true);
        sinks.fail_closes(true);

        let Err(MetricsError::Multiple(errors)) = collector.close().await else {
            panic!("expected both the flush and the close error");
        };
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], MetricsError::Flush { .. }));
        assert!(matches!(errors[1], MetricsError::SinkClose { .. }));
        assert_eq!(sinks.records()[0].closes, 1);
    }

    #[tokio::test]
    async fn flush_now_failure_marks_failed() {
        let sinks = MemorySinks::new();
        let (handler, _) = counting_handler();
        let collector = RotatingCollector::start(
            "cpu",
            &options(&sinks, Duration::from_secs(60)),
            &Handle::current(),
            handler,
        )
        .unwrap_or_else(|e| panic!("start: {e}"));

        sinks.fail_writes(true);
        assert!(collector.add(json!({"v": 1})).is_ok());
        assert!(matches!(collector.flush_now(), Err(MetricsError::Flush { .. })));
        assert_eq!(collector.state(), CollectorState::Failed);
        assert!(collector.close().await.is_ok());
    }
}
