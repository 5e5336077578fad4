//! Core data types moved between the store and the in-memory series
//!
//! # Key Types
//!
//! - **`Timestamp`**: Unix time in nanoseconds, the store's native unit
//! - **`Measurement`**: A single timestamped scalar value
//! - **`Series`**: The append-only, insertion-ordered collection held per stream
//!
//! # Example
//!
//! ```rust
//! use livesync::types::{Measurement, nanos_to_secs};
//!
//! let m = Measurement::new(1_700_000_000_000_000_000, 21.5);
//! assert_eq!(nanos_to_secs(m.timestamp), 1_700_000_000.0);
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Unix timestamp in nanoseconds since epoch (1970-01-01 00:00:00 UTC)
pub type Timestamp = i64;

const NANOS_PER_MILLI: i64 = 1_000_000;

/// Current wall-clock time as a [`Timestamp`]
///
/// Saturates at `i64::MAX` for dates past the year 2262.
pub fn now_nanos() -> Timestamp {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

/// Convert a nanosecond timestamp to seconds since epoch
///
/// The result is truncated to millisecond precision, which is what plotting
/// axes work with.
pub fn nanos_to_secs(ts: Timestamp) -> f64 {
    (ts / NANOS_PER_MILLI) as f64 / 1000.0
}

/// A single timestamped measurement
///
/// The atomic unit of data moved from the store into a [`Series`].
///
/// # Fields
///
/// - `timestamp`: Unix timestamp in nanoseconds
/// - `value`: IEEE 754 double-precision value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Unix timestamp in nanoseconds since epoch
    pub timestamp: Timestamp,

    /// Measured value
    pub value: f64,
}

impl Measurement {
    /// Create a new measurement
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Axis-aligned bounds of a series, for fitting a plot to its data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesBounds {
    /// Earliest timestamp
    pub min_timestamp: Timestamp,
    /// Latest timestamp
    pub max_timestamp: Timestamp,
    /// Smallest value
    pub min_value: f64,
    /// Largest value
    pub max_value: f64,
}

/// Append-only, insertion-ordered sequence of measurements
///
/// Only the synchronization engine appends to a series; callers get read
/// access for rendering. Entries are never mutated or evicted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: Vec<Measurement>,
}

impl Series {
    /// Create an empty series
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of measurements
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series holds no measurements
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All measurements in insertion order
    pub fn as_slice(&self) -> &[Measurement] {
        &self.points
    }

    /// Iterate over measurements in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.points.iter()
    }

    /// Most recently appended measurement
    pub fn last(&self) -> Option<&Measurement> {
        self.points.last()
    }

    /// Timestamps as seconds since epoch, ready to hand to a plotting library
    pub fn timestamps_secs(&self) -> Vec<f64> {
        self.points.iter().map(|m| nanos_to_secs(m.timestamp)).collect()
    }

    /// Values in insertion order
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|m| m.value).collect()
    }

    /// Bounds of the data, or `None` for an empty series
    ///
    /// NaN values are skipped when computing the value range.
    pub fn bounds(&self) -> Option<SeriesBounds> {
        let first = self.points.first()?;
        let mut bounds = SeriesBounds {
            min_timestamp: first.timestamp,
            max_timestamp: first.timestamp,
            min_value: f64::INFINITY,
            max_value: f64::NEG_INFINITY,
        };

        for m in &self.points {
            bounds.min_timestamp = bounds.min_timestamp.min(m.timestamp);
            bounds.max_timestamp = bounds.max_timestamp.max(m.timestamp);
            if !m.value.is_nan() {
                bounds.min_value = bounds.min_value.min(m.value);
                bounds.max_value = bounds.max_value.max(m.value);
            }
        }

        Some(bounds)
    }

    /// Append a batch in the order received
    pub(crate) fn append(&mut self, batch: &[Measurement]) {
        self.points.extend_from_slice(batch);
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
