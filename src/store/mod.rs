//! Store connection adapter
//!
//! The remote store is reached through a single client handle that is not
//! assumed to be reentrant. [`StoreConnection`] owns that handle and
//! serializes every query through an internal mutex, so any number of fetch
//! tasks can share one connection behind an `Arc`.
//!
//! # Example
//!
//! ```rust,no_run
//! use livesync::config::StoreConfig;
//! use livesync::store::StoreConnection;
//! use std::sync::Arc;
//!
//! # fn example() -> livesync::Result<()> {
//! let connection = Arc::new(StoreConnection::new());
//! connection.connect(&StoreConfig::default())?;
//!
//! let rows = connection.query("SELECT * FROM \"temperature\" WHERE time > 0")?;
//! # Ok(())
//! # }
//! ```

pub mod influx;
pub mod util;

use crate::config::StoreConfig;
use crate::error::{FetchError, Result};
use crate::types::Timestamp;

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::thread;
use tokio::runtime::Handle;
use tracing::{debug, info};

pub use influx::InfluxClient;

/// A single field value as returned by the store
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Floating point number
    Float(f64),
    /// Integer number
    Integer(i64),
    /// String value
    String(String),
    /// Boolean value
    Boolean(bool),
    /// Missing value
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}i", v),
            FieldValue::String(s) => write!(f, "\"{}\"", s),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

/// A raw row returned by a store query
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Row timestamp in nanoseconds
    pub timestamp: Timestamp,
    /// Field name/value pairs in column order, excluding the time column
    pub fields: Vec<(String, FieldValue)>,
}

impl Row {
    /// Create a row
    pub fn new(timestamp: Timestamp, fields: Vec<(String, FieldValue)>) -> Self {
        Self { timestamp, fields }
    }

    /// Create a row with a single `value` field
    pub fn with_value(timestamp: Timestamp, value: FieldValue) -> Self {
        Self::new(timestamp, vec![("value".to_string(), value)])
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// Raw handle to a time-series store
///
/// Implementations do not need to be reentrant; `query` takes `&mut self`
/// and [`StoreConnection`] guarantees exclusive access. Implementations must
/// not retry on their own.
pub trait StoreClient: Send {
    /// Run a query and return every resulting row in store order
    fn query(&mut self, text: &str) -> std::result::Result<Vec<Row>, FetchError>;

    /// Human readable description of the target, safe to log
    fn describe(&self) -> String {
        "store".to_string()
    }
}

/// Serialized gateway to the shared store handle
///
/// Created disconnected; [`connect`](Self::connect) or
/// [`attach`](Self::attach) installs a client. Reconnecting replaces the
/// client under the lock, so queries already running finish against the old
/// handle and later ones use the new one.
pub struct StoreConnection {
    /// The only handle to the store
    client: Mutex<Option<Box<dyn StoreClient>>>,
    /// Sanitized description of the current target
    target: RwLock<Option<String>>,
}

impl StoreConnection {
    /// Create a disconnected connection
    pub fn new() -> Self {
        Self {
            client: Mutex::new(None),
            target: RwLock::new(None),
        }
    }

    /// Create a connection around an existing client
    pub fn with_client(client: impl StoreClient + 'static) -> Self {
        let connection = Self::new();
        connection.attach(Box::new(client));
        connection
    }

    /// Connect to the InfluxDB instance described by `config`
    ///
    /// Creates the database if it does not exist yet. This blocks the calling
    /// thread until the store answers or the request times out. The HTTP
    /// client is blocking and must not be built or used on a Tokio worker, so
    /// when called from inside a runtime the work moves to a short-lived
    /// plain thread; the caller's thread still waits for it.
    pub fn connect(&self, config: &StoreConfig) -> Result<()> {
        let client = if Handle::try_current().is_ok() {
            thread::scope(|scope| scope.spawn(|| InfluxClient::connect(config)).join())
                .map_err(|_| FetchError::Task("store connect panicked".to_string()))??
        } else {
            InfluxClient::connect(config)?
        };
        info!(target = %client.describe(), "Connected to store");
        self.attach(Box::new(client));
        Ok(())
    }

    /// Install a client, replacing any existing one
    pub fn attach(&self, client: Box<dyn StoreClient>) {
        let description = client.describe();
        let mut guard = self.client.lock();
        *guard = Some(client);
        *self.target.write() = Some(description);
    }

    /// Drop the current client
    ///
    /// Waits for an in-flight query to finish before releasing the handle.
    pub fn disconnect(&self) {
        let mut guard = self.client.lock();
        if guard.take().is_some() {
            debug!("Store client released");
        }
        *self.target.write() = None;
    }

    /// Whether a client is installed
    pub fn is_connected(&self) -> bool {
        self.target.read().is_some()
    }

    /// Sanitized description of the connected store, if any
    pub fn target(&self) -> Option<String> {
        self.target.read().clone()
    }

    /// Run a query against the store
    ///
    /// Blocks the calling thread for the duration of the query, including
    /// time spent waiting for other queries to release the handle.
    pub fn query(&self, text: &str) -> std::result::Result<Vec<Row>, FetchError> {
        let mut guard = self.client.lock();
        match guard.as_mut() {
            Some(client) => client.query(text),
            None => Err(FetchError::Connection(
                "not connected to a store".to_string(),
            )),
        }
    }
}

impl Default for StoreConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConnection")
            .field("target", &*self.target.read())
            .finish()
    }
}
