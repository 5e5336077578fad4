//! Shared fakes for integration tests

#![allow(dead_code)]

use livesync::store::{FieldValue, Row, StoreClient};
use livesync::sync::{Scheduler, StreamState};
use livesync::FetchError;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Row with a float `value` field
pub fn row(timestamp: i64, value: f64) -> Row {
    Row::with_value(timestamp, FieldValue::Float(value))
}

/// Pull `(measurement, cursor)` out of `SELECT * FROM "name" WHERE time > N`
pub fn parse_query(text: &str) -> (String, i64) {
    let start = text.find('"').expect("quoted measurement") + 1;
    let end = start + text[start..].find('"').expect("closing quote");
    let cursor = text
        .rsplit("time > ")
        .next()
        .and_then(|c| c.trim().parse().ok())
        .expect("cursor");
    (text[start..end].to_string(), cursor)
}

/// In-memory store answering "rows after cursor" queries per measurement
#[derive(Clone, Default)]
pub struct TableStore {
    tables: Arc<Mutex<HashMap<String, Vec<Row>>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, measurement: &str, rows: Vec<Row>) {
        self.tables
            .lock()
            .unwrap()
            .entry(measurement.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn client(&self) -> TableClient {
        TableClient {
            store: self.clone(),
        }
    }
}

pub struct TableClient {
    store: TableStore,
}

impl StoreClient for TableClient {
    fn query(&mut self, text: &str) -> Result<Vec<Row>, FetchError> {
        self.store.queries.lock().unwrap().push(text.to_string());
        let (name, cursor) = parse_query(text);
        let tables = self.store.tables.lock().unwrap();
        Ok(tables
            .get(&name)
            .map(|rows| rows.iter().filter(|r| r.timestamp > cursor).cloned().collect())
            .unwrap_or_default())
    }
}

/// Client driven by a closure
pub struct FnClient<F>(pub F);

impl<F> StoreClient for FnClient<F>
where
    F: FnMut(&str) -> Result<Vec<Row>, FetchError> + Send,
{
    fn query(&mut self, text: &str) -> Result<Vec<Row>, FetchError> {
        (self.0)(text)
    }
}

/// A latch that blocks queries until opened
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cvar.wait(open).unwrap();
        }
    }
}

/// Client whose queries block on a gate, tracking calls and overlap
#[derive(Clone, Default)]
pub struct GatedProbe {
    pub gate: Gate,
    pub calls: Arc<AtomicUsize>,
    pub active: Arc<AtomicUsize>,
    pub max_active: Arc<AtomicUsize>,
    pub dropped: Arc<AtomicBool>,
}

impl GatedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self, rows: Vec<Row>) -> GatedClient {
        GatedClient {
            probe: self.clone(),
            rows,
        }
    }
}

pub struct GatedClient {
    probe: GatedProbe,
    rows: Vec<Row>,
}

impl StoreClient for GatedClient {
    fn query(&mut self, _text: &str) -> Result<Vec<Row>, FetchError> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.probe.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_active.fetch_max(now, Ordering::SeqCst);

        self.probe.gate.wait();

        self.probe.active.fetch_sub(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }
}

impl Drop for GatedClient {
    fn drop(&mut self) {
        self.probe.dropped.store(true, Ordering::SeqCst);
    }
}

/// Poll until `condition` holds, failing after five seconds
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Run one full fetch cycle: dispatch for every idle stream, then poll the
/// outstanding ones until each has been merged
///
/// Streams that finish early are not polled again, so each stream fetches
/// exactly once.
pub fn run_cycle(scheduler: &Scheduler, streams: &mut [StreamState]) {
    scheduler.poll(streams);
    wait_until(|| {
        for stream in streams.iter_mut().filter(|s| s.is_fetching()) {
            scheduler.poll(std::slice::from_mut(stream));
        }
        streams.iter().all(|s| !s.is_fetching())
    });
}
