//! livesync - incremental, non-blocking time-series synchronization
//!
//! Keeps ever-growing in-memory series synchronized with a remote
//! time-series store (InfluxDB) from a thread that must never block, such as
//! a GUI render loop:
//! - Per-stream cursors that only move forward
//! - Single-flight background fetches on Tokio's blocking pool
//! - Non-blocking completion checks once per tick
//! - All-or-nothing merges; failures are recorded and retried next tick

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Configuration management with TOML support
pub mod config;

/// Prometheus metrics for fetches and merges
pub mod metrics;

/// Serialized access to the shared store handle, and the InfluxDB client
pub mod store;

/// Stream state, fetch tasks and the polling scheduler
pub mod sync;

// Re-export main types
pub use config::Config;
pub use error::{Error, FetchError, FetchResult, Result};
pub use store::{StoreClient, StoreConnection};
pub use sync::{PollReport, Scheduler, StreamState, StreamStatus};
pub use types::{Measurement, Series, Timestamp};
