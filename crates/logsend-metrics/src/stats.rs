//! Process runtime statistics as metric messages.

use chrono::{DateTime, Utc};
use logsend_core::{LogMessage, Priority};
use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use crate::error::{MetricsError, Result};

/// Schema tag of messages produced by [`RuntimeStats::message`].
pub const STATS_SCHEMA: &str = "process.stats";

/// One reading of the current process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// When the reading was taken
    pub taken_at: DateTime<Utc>,
    /// CPU usage since the previous refresh, in percent of one core
    pub cpu_percent: f32,
    /// Resident memory in bytes
    pub memory_bytes: u64,
    /// Virtual memory in bytes
    pub virtual_memory_bytes: u64,
    /// Seconds since the process started
    pub run_time_secs: u64,
}

/// Change between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsDelta {
    /// Milliseconds between the readings
    pub elapsed_ms: i64,
    /// Change in resident memory
    pub memory_bytes: i64,
    /// Change in virtual memory
    pub virtual_memory_bytes: i64,
}

impl StatsDelta {
    /// Computes the change from `previous` to `current`.
    #[must_use]
    pub fn between(previous: &StatsSnapshot, current: &StatsSnapshot) -> Self {
        let diff = |a: u64, b: u64| i64::try_from(i128::from(b) - i128::from(a)).unwrap_or(0);
        Self {
            elapsed_ms: (current.taken_at - previous.taken_at).num_milliseconds(),
            memory_bytes: diff(previous.memory_bytes, current.memory_bytes),
            virtual_memory_bytes: diff(previous.virtual_memory_bytes, current.virtual_memory_bytes),
        }
    }
}

/// Samples the current process and remembers the last reading.
///
/// Owned by the caller; nothing is cached globally.
pub struct RuntimeStats {
    system: System,
    pid: Pid,
    previous: Option<StatsSnapshot>,
}

impl std::fmt::Debug for RuntimeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeStats")
            .field("pid", &self.pid)
            .field("previous", &self.previous)
            .finish_non_exhaustive()
    }
}

impl RuntimeStats {
    /// Creates a sampler for the current process.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Stats`] on platforms without process info.
    pub fn new() -> Result<Self> {
        let pid = sysinfo::get_current_pid().map_err(|e| MetricsError::Stats(e.to_string()))?;
        Ok(Self {
            system: System::new(),
            pid,
            previous: None,
        })
    }

    /// Returns the last reading, if any.
    #[must_use]
    pub const fn previous(&self) -> Option<&StatsSnapshot> {
        self.previous.as_ref()
    }

    /// Takes a reading and returns it with the change since the last one.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Stats`] if the process cannot be inspected.
    pub fn sample(&mut self) -> Result<(StatsSnapshot, Option<StatsDelta>)> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );
        let process = self
            .system
            .process(self.pid)
            .ok_or_else(|| MetricsError::Stats(format!("process {} not found", self.pid)))?;

        let snapshot = StatsSnapshot {
            taken_at: Utc::now(),
            cpu_percent: process.cpu_usage(),
            memory_bytes: process.memory(),
            virtual_memory_bytes: process.virtual_memory(),
            run_time_secs: process.run_time(),
        };
        let delta = self
            .previous
            .as_ref()
            .map(|previous| StatsDelta::between(previous, &snapshot));
        self.previous = Some(snapshot);
        Ok((snapshot, delta))
    }

    /// Takes a reading and wraps it in a `process.stats` metric message.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Stats`] if the process cannot be inspected.
    pub fn message(&mut self) -> Result<LogMessage> {
        let (snapshot, delta) = self.sample()?;
        let payload = serde_json::json!({
            "cpu_percent": snapshot.cpu_percent,
            "memory_bytes": snapshot.memory_bytes,
            "virtual_memory_bytes": snapshot.virtual_memory_bytes,
            "run_time_secs": snapshot.run_time_secs,
            "delta": delta,
        });
        Ok(LogMessage::builder()
            .priority(Priority::Info)
            .schema(STATS_SCHEMA)
            .payload(payload)
            .timestamp(snapshot.taken_at)
            .build())
    }
}
