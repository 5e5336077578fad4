//! Background fetch tasks
//!
//! A [`FetchTask`] queries the store for every row of one stream newer than a
//! cursor snapshot and parses the rows into measurements. [`FetchTask::spawn`]
//! runs it on the runtime's blocking pool and hands back a [`FetchHandle`]
//! whose completion can be checked without blocking.
//!
//! Failures never cross the task boundary as panics: store errors, parse
//! errors and panics inside the task all arrive as `Err` on the handle.

use super::query::{build_query, parse_rows};
use crate::error::{FetchError, FetchResult};
use crate::store::StoreConnection;
use crate::types::Timestamp;

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, trace};

/// One query-and-parse operation bound to a cursor snapshot
pub struct FetchTask {
    connection: Arc<StoreConnection>,
    stream: String,
    cursor: Timestamp,
}

impl FetchTask {
    /// Create a task for `stream` that fetches rows strictly after `cursor`
    pub fn new(connection: Arc<StoreConnection>, stream: impl Into<String>, cursor: Timestamp) -> Self {
        Self {
            connection,
            stream: stream.into(),
            cursor,
        }
    }

    /// Cursor the query window starts after
    pub fn cursor(&self) -> Timestamp {
        self.cursor
    }

    /// Run the fetch on the current thread
    ///
    /// Blocks until the store answers.
    pub fn run(&self) -> FetchResult {
        let query = build_query(&self.stream, self.cursor);
        trace!(stream = %self.stream, query = %query, "Running fetch");

        let rows = self.connection.query(&query)?;
        let measurements = parse_rows(&rows)?;

        debug!(
            stream = %self.stream,
            cursor = self.cursor,
            rows = measurements.len(),
            "Fetch completed"
        );
        Ok(measurements)
    }

    /// Run the fetch on the runtime's blocking pool
    ///
    /// The task keeps its own reference to the store connection and runs to
    /// completion even if the returned handle is dropped.
    pub fn spawn(self, runtime: &Handle) -> FetchHandle {
        let (tx, rx) = oneshot::channel();
        let cursor = self.cursor;

        runtime.spawn_blocking(move || {
            let result = catch_unwind(AssertUnwindSafe(|| self.run()))
                .unwrap_or_else(|panic| Err(FetchError::Task(panic_message(panic.as_ref()))));
            // The receiver is gone if the stream was dropped; nothing to report to
            let _ = tx.send(result);
        });

        FetchHandle {
            cursor,
            started_at: Instant::now(),
            receiver: rx,
        }
    }
}

/// Handle to an outstanding fetch
#[derive(Debug)]
pub struct FetchHandle {
    cursor: Timestamp,
    started_at: Instant,
    receiver: oneshot::Receiver<FetchResult>,
}

impl FetchHandle {
    /// Cursor captured when the fetch was dispatched
    pub fn cursor(&self) -> Timestamp {
        self.cursor
    }

    /// Time since dispatch
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Take the result if the task has finished, without blocking
    ///
    /// Returns `None` while the task is still running. A task that went away
    /// without reporting (for example because the runtime shut down) yields a
    /// [`FetchError::Task`].
    pub fn try_take(&mut self) -> Option<FetchResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(FetchError::Task(
                "fetch task ended without reporting a result".to_string(),
            ))),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("fetch task panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("fetch task panicked: {}", s)
    } else {
        "fetch task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FieldValue, Row, StoreClient};
    use crate::types::Measurement;

    struct FixedClient(Vec<Row>);

    impl StoreClient for FixedClient {
        fn query(&mut self, _text: &str) -> Result<Vec<Row>, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct PanickingClient;

    impl StoreClient for PanickingClient {
        fn query(&mut self, _text: &str) -> Result<Vec<Row>, FetchError> {
            panic!("client exploded");
        }
    }

    async fn wait(mut handle: FetchHandle) -> FetchResult {
        loop {
            if let Some(result) = handle.try_take() {
                return result;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[test]
    fn test_run_parses_rows() {
        let connection = Arc::new(StoreConnection::with_client(FixedClient(vec![
            Row::with_value(1, FieldValue::Float(10.0)),
            Row::with_value(2, FieldValue::Integer(20)),
        ])));

        let task = FetchTask::new(connection, "temperature", 0);
        assert_eq!(
            task.run().unwrap(),
            vec![Measurement::new(1, 10.0), Measurement::new(2, 20.0)]
        );
    }

    #[test]
    fn test_run_without_connection_fails() {
        let task = FetchTask::new(Arc::new(StoreConnection::new()), "temperature", 0);
        assert!(matches!(task.run(), Err(FetchError::Connection(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_spawn_delivers_result() {
        let connection = Arc::new(StoreConnection::with_client(FixedClient(vec![
            Row::with_value(5, FieldValue::Float(1.5)),
        ])));

        let handle = FetchTask::new(connection, "humidity", 4).spawn(&Handle::current());
        assert_eq!(handle.cursor(), 4);
        assert_eq!(wait(handle).await.unwrap(), vec![Measurement::new(5, 1.5)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_spawn_captures_panics() {
        let connection = Arc::new(StoreConnection::with_client(PanickingClient));

        let handle = FetchTask::new(connection.clone(), "humidity", 0).spawn(&Handle::current());
        let err = wait(handle).await.unwrap_err();
        assert!(matches!(err, FetchError::Task(_)));
        assert!(err.message().contains("client exploded"));

        // parking_lot mutexes do not poison, so the connection stays usable
        assert!(connection.is_connected());
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"boom"), "fetch task panicked: boom");
        assert_eq!(
            panic_message(&String::from("bang")),
            "fetch task panicked: bang"
        );
        assert_eq!(panic_message(&42u32), "fetch task panicked");
    }
}
