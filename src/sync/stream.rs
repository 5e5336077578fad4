//! Per-stream synchronization state
//!
//! A [`StreamState`] pairs one named metric with its cursor, its in-memory
//! series and at most one outstanding fetch:
//!
//! ```text
//!            dispatch (cursor copied)
//!   Idle ─────────────────────────────▶ Fetching
//!    ▲                                     │
//!    └──── result taken, merged/logged ────┘
//! ```
//!
//! The cursor is created at "now", so a stream never backfills history older
//! than itself, and only ever moves forward.

use super::fetch::FetchHandle;
use crate::error::{FetchError, FetchResult};
use crate::types::{now_nanos, Measurement, Series, Timestamp};

use tracing::warn;

/// Whether a fetch is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// No fetch outstanding; the next poll dispatches one
    Idle,
    /// A fetch was dispatched with this cursor and has not been consumed yet
    Fetching {
        /// Cursor captured at dispatch
        cursor: Timestamp,
    },
}

/// Outcome of merging one fetch result
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// This many measurements were appended
    Merged(usize),
    /// The fetch returned no rows
    Empty,
    /// The fetch failed; nothing was changed
    Failed(FetchError),
}

/// Counters describing a stream's synchronization history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Fetches dispatched
    pub fetches_started: u64,
    /// Fetches that returned rows or an empty batch
    pub fetches_succeeded: u64,
    /// Fetches that failed
    pub fetches_failed: u64,
    /// Measurements appended to the series
    pub measurements_merged: u64,
}

/// Cursor, series and outstanding fetch for one named metric
#[derive(Debug)]
pub struct StreamState {
    name: String,
    cursor: Timestamp,
    series: Series,
    pending: Option<FetchHandle>,
    last_error: Option<FetchError>,
    stats: SyncStats,
}

impl StreamState {
    /// Create a stream whose cursor starts at the current time
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_cursor(name, now_nanos())
    }

    /// Create a stream with an explicit starting cursor
    pub fn with_cursor(name: impl Into<String>, cursor: Timestamp) -> Self {
        Self {
            name: name.into(),
            cursor,
            series: Series::new(),
            pending: None,
            last_error: None,
            stats: SyncStats::default(),
        }
    }

    /// Metric name this stream queries
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Watermark: every row at or before it is assumed merged
    pub fn cursor(&self) -> Timestamp {
        self.cursor
    }

    /// Measurements merged so far
    pub fn series(&self) -> &Series {
        &self.series
    }

    /// Current state of the fetch state machine
    pub fn status(&self) -> StreamStatus {
        match &self.pending {
            Some(handle) => StreamStatus::Fetching {
                cursor: handle.cursor(),
            },
            None => StreamStatus::Idle,
        }
    }

    /// Whether a fetch is outstanding
    pub fn is_fetching(&self) -> bool {
        self.pending.is_some()
    }

    /// Error from the most recent fetch, cleared by the next successful one
    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    /// Synchronization counters
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Record a dispatched fetch; the stream moves to `Fetching`
    ///
    /// Returns the handle back if a fetch is already outstanding, leaving
    /// the stream untouched.
    pub(crate) fn begin_fetch(&mut self, handle: FetchHandle) -> Result<(), FetchHandle> {
        if self.pending.is_some() {
            return Err(handle);
        }
        self.pending = Some(handle);
        self.stats.fetches_started += 1;
        Ok(())
    }

    /// Take the outstanding fetch's result if it has finished
    ///
    /// The stream moves back to `Idle` once a result is returned. Returns the
    /// result with the time the fetch took.
    pub(crate) fn take_completed(&mut self) -> Option<(FetchResult, std::time::Duration)> {
        let handle = self.pending.as_mut()?;
        let result = handle.try_take()?;
        let elapsed = handle.elapsed();
        self.pending = None;
        Some((result, elapsed))
    }

    /// Merge a fetch result into the stream
    ///
    /// - `Ok` with rows: rows are appended in the order received and the
    ///   cursor moves to the newest timestamp seen, never backwards.
    /// - `Ok` empty: nothing changes.
    /// - `Err`: series and cursor stay as they were; the error is kept as
    ///   [`last_error`](Self::last_error).
    pub fn apply(&mut self, result: FetchResult) -> MergeOutcome {
        match result {
            Ok(batch) if batch.is_empty() => {
                self.stats.fetches_succeeded += 1;
                self.last_error = None;
                MergeOutcome::Empty
            },
            Ok(batch) => {
                self.merge(&batch);
                self.stats.fetches_succeeded += 1;
                self.stats.measurements_merged += batch.len() as u64;
                self.last_error = None;
                MergeOutcome::Merged(batch.len())
            },
            Err(err) => {
                warn!(
                    stream = %self.name,
                    cursor = self.cursor,
                    kind = err.kind(),
                    error = %err,
                    "Fetch failed, will retry on next poll"
                );
                self.stats.fetches_failed += 1;
                self.last_error = Some(err.clone());
                MergeOutcome::Failed(err)
            },
        }
    }

    fn merge(&mut self, batch: &[Measurement]) {
        self.series.append(batch);
        if let Some(newest) = batch.iter().map(|m| m.timestamp).max() {
            self.cursor = self.cursor.max(newest);
        }
    }
}
