//! Incremental synchronization engine
//!
//! Keeps in-memory series in step with the store without blocking the
//! caller. The pieces, leaves first:
//!
//! - [`query`]: query text for "rows after the cursor" and row parsing
//! - [`fetch`]: background fetch tasks and their non-blocking handles
//! - [`stream`]: per-stream cursor, series and single-flight state machine
//! - [`scheduler`]: the per-tick `poll` driving every stream
//!
//! # Example
//!
//! ```rust,no_run
//! use livesync::store::StoreConnection;
//! use livesync::sync::Scheduler;
//! use std::sync::Arc;
//!
//! # fn example(runtime: &tokio::runtime::Runtime) {
//! let connection = Arc::new(StoreConnection::new());
//! let scheduler = Scheduler::new(connection, runtime.handle().clone());
//! let mut streams = vec![
//!     scheduler.create_stream("temperature"),
//!     scheduler.create_stream("humidity"),
//! ];
//!
//! // once per frame
//! scheduler.poll(&mut streams);
//! for stream in &streams {
//!     let _points = stream.series().as_slice();
//! }
//! # }
//! ```

pub mod fetch;
pub mod query;
pub mod scheduler;
pub mod stream;

pub use fetch::{FetchHandle, FetchTask};
pub use scheduler::{PollReport, Scheduler};
pub use stream::{MergeOutcome, StreamState, StreamStatus, SyncStats};
