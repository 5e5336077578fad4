//! Synchronization scheduler
//!
//! [`Scheduler::poll`] is meant to be called once per caller tick, typically
//! from a render loop. Each call looks at every stream once:
//!
//! - an idle stream gets a fetch dispatched with a copy of its cursor;
//! - a fetching stream is checked without blocking, and a finished result
//!   is merged (or its error recorded). The stream is idle again and will
//!   dispatch on the following poll.
//!
//! `poll` never blocks and never fails; the scheduler holds no per-stream
//! state, so it can be called as often as the caller likes.

use super::fetch::FetchTask;
use super::stream::{MergeOutcome, StreamState};
use crate::error::{Error, Result};
use crate::metrics;
use crate::store::StoreConnection;

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, trace};

/// Summary of one `poll` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Fetches dispatched
    pub dispatched: usize,
    /// Fetches still outstanding after the check
    pub in_flight: usize,
    /// Completed fetches that returned rows
    pub merged_batches: usize,
    /// Measurements appended across all streams
    pub merged_measurements: usize,
    /// Completed fetches that returned no rows
    pub empty: usize,
    /// Completed fetches that failed
    pub failed: usize,
}

impl PollReport {
    /// Whether any stream's series or error status changed
    pub fn changed(&self) -> bool {
        self.merged_batches > 0 || self.failed > 0
    }
}

/// Dispatches fetches and merges their results on the caller's thread
#[derive(Debug, Clone)]
pub struct Scheduler {
    connection: Arc<StoreConnection>,
    runtime: Handle,
}

impl Scheduler {
    /// Create a scheduler that runs fetches on `runtime`'s blocking pool
    pub fn new(connection: Arc<StoreConnection>, runtime: Handle) -> Self {
        Self {
            connection,
            runtime,
        }
    }

    /// Create a scheduler on the runtime the caller is running in
    pub fn with_current_runtime(connection: Arc<StoreConnection>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            Error::Configuration(format!("Scheduler requires a Tokio runtime: {}", e))
        })?;
        Ok(Self::new(connection, runtime))
    }

    /// Shared store connection
    pub fn connection(&self) -> &Arc<StoreConnection> {
        &self.connection
    }

    /// Create a stream whose cursor starts now
    pub fn create_stream(&self, name: impl Into<String>) -> StreamState {
        StreamState::new(name)
    }

    /// Advance every stream by one tick
    ///
    /// Streams are left idle while the connection has no client installed;
    /// outstanding fetches are still collected.
    pub fn poll(&self, streams: &mut [StreamState]) -> PollReport {
        let mut report = PollReport::default();
        let connected = self.connection.is_connected();

        for stream in streams.iter_mut() {
            if stream.is_fetching() {
                self.collect(stream, &mut report);
            } else if connected && self.dispatch(stream) {
                report.dispatched += 1;
                report.in_flight += 1;
            }
        }

        if report.changed() {
            debug!(
                merged = report.merged_measurements,
                failed = report.failed,
                in_flight = report.in_flight,
                "Poll merged results"
            );
        }
        report
    }

    /// Start a fetch for an idle stream; returns false if one is already running
    fn dispatch(&self, stream: &mut StreamState) -> bool {
        if stream.is_fetching() {
            return false;
        }

        let task = FetchTask::new(self.connection.clone(), stream.name(), stream.cursor());
        trace!(stream = %stream.name(), cursor = task.cursor(), "Dispatching fetch");

        let handle = task.spawn(&self.runtime);
        stream.begin_fetch(handle).is_ok()
    }

    fn collect(&self, stream: &mut StreamState, report: &mut PollReport) {
        let Some((result, elapsed)) = stream.take_completed() else {
            report.in_flight += 1;
            return;
        };

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::record_fetch(stream.name(), status, elapsed.as_secs_f64());

        match stream.apply(result) {
            MergeOutcome::Merged(count) => {
                metrics::record_merged(stream.name(), count);
                debug!(
                    stream = %stream.name(),
                    count,
                    cursor = stream.cursor(),
                    "Merged new measurements"
                );
                report.merged_batches += 1;
                report.merged_measurements += count;
            },
            MergeOutcome::Empty => report.empty += 1,
            MergeOutcome::Failed(_) => report.failed += 1,
        }
    }
}
