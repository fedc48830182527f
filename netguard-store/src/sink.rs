//! Sink abstraction for NetGuard.
//!
//! The write side (`Sink`) and read side (`RecordReader`) are separate traits
//! so the capture engine can be driven against a scripted sink in tests while
//! consumers read through a real store.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use netguard_schema::{NewRecord, PacketRecord, Protocol, RecordId};
use serde::Serialize;
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("cannot connect to store {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("write failed: {0}")]
    Write(#[source] rusqlite::Error),

    #[error("query failed: {0}")]
    Query(#[source] rusqlite::Error),

    #[error("clear failed: {0}")]
    Clear(#[source] rusqlite::Error),

    #[error("store is not connected")]
    NotConnected,

    #[error("not a single read-only statement: {0}")]
    ReadOnly(String),
}

/// Number of records seen from one source address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub src_ip: String,
    pub count: u64,
}

/// One value in a free-form query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NULL"),
            Cell::Integer(v) => write!(f, "{}", v),
            Cell::Real(v) => write!(f, "{}", v),
            Cell::Text(v) => f.write_str(v),
            Cell::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Result of a free-form read-only query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Write side of the store.
///
/// A sink is owned by exactly one execution context; it is `Send` so it can be
/// moved onto the capture thread, but never shared.
pub trait Sink: Send {
    /// Persist one record, stamping it with the store's clock.
    ///
    /// On transient connection loss the sink reconnects and retries once.
    fn write(&mut self, record: &NewRecord) -> Result<RecordId, SinkError>;

    /// Delete every record. Returns the number deleted.
    ///
    /// Irreversible. Confirmation is the caller's job.
    fn clear(&mut self) -> Result<u64, SinkError>;

    /// Release the connection. Safe to call repeatedly or when never opened.
    fn close(&mut self);

    /// Whether a connection is currently held.
    fn is_open(&self) -> bool;
}

/// Read side of the store. Every method is read-only.
pub trait RecordReader {
    /// Total number of records.
    fn count_total(&self) -> Result<u64, SinkError>;

    /// Record count per canonical protocol. Stored values are grouped after
    /// trimming and uppercasing, so legacy rows are still counted correctly.
    fn count_by_protocol(&self) -> Result<BTreeMap<Protocol, u64>, SinkError>;

    /// Records captured within the last `window_secs` of the store's clock.
    fn count_since(&self, window_secs: u64) -> Result<u64, SinkError>;

    /// Source addresses by record count descending, ties broken by address
    /// ascending.
    fn top_sources(&self, limit: usize) -> Result<Vec<SourceCount>, SinkError>;

    /// Most recent records, newest first by insertion order.
    fn recent(&self, limit: usize) -> Result<Vec<PacketRecord>, SinkError>;

    /// Run a single read-only statement.
    fn query(&self, sql: &str) -> Result<QueryRows, SinkError>;
}

/// Opens sinks. Each caller gets a connection it alone owns.
pub trait SinkOpener: Send + Sync {
    type Sink: Sink + 'static;

    fn open(&self) -> Result<Self::Sink, SinkError>;
}

impl<O: SinkOpener + ?Sized> SinkOpener for Arc<O> {
    type Sink = O::Sink;

    fn open(&self) -> Result<Self::Sink, SinkError> {
        (**self).open()
    }
}

/// Build the error a mock reports for a simulated outage.
fn simulated_outage() -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
        Some("simulated outage".to_string()),
    )
}

/// Shared state behind a `MockSink`, inspectable after the sink has been
/// moved to another thread.
#[derive(Debug, Default)]
struct MockSinkState {
    written: Vec<NewRecord>,
    failures: VecDeque<bool>,
    fail_all: bool,
    attempts: u64,
    close_calls: u64,
    open: bool,
}

/// In-memory sink for tests.
///
/// Writes can be scripted to fail, either for the next N attempts or until
/// the outage is ended. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockSink {
    state: Arc<Mutex<MockSinkState>>,
}

impl MockSink {
    pub fn new() -> Self {
        let sink = Self::default();
        sink.lock().open = true;
        sink
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockSinkState> {
        // Poisoning only happens if a test thread already panicked.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail the next `count` write attempts.
    pub fn fail_next(&self, count: usize) {
        let mut state = self.lock();
        state.failures.extend(std::iter::repeat(true).take(count));
    }

    /// Fail every write until `end_outage` is called.
    pub fn begin_outage(&self) {
        self.lock().fail_all = true;
    }

    pub fn end_outage(&self) {
        self.lock().fail_all = false;
    }

    /// Records persisted so far, in write order.
    pub fn written(&self) -> Vec<NewRecord> {
        self.lock().written.clone()
    }

    /// Write attempts, successful or not.
    pub fn attempts(&self) -> u64 {
        self.lock().attempts
    }

    pub fn close_calls(&self) -> u64 {
        self.lock().close_calls
    }
}

impl Sink for MockSink {
    fn write(&mut self, record: &NewRecord) -> Result<RecordId, SinkError> {
        let mut state = self.lock();
        state.attempts += 1;
        let scripted = state.failures.pop_front().unwrap_or(false);
        if scripted || state.fail_all {
            return Err(SinkError::Write(simulated_outage()));
        }
        state.open = true;
        state.written.push(record.clone());
        Ok(state.written.len() as RecordId)
    }

    fn clear(&mut self) -> Result<u64, SinkError> {
        let mut state = self.lock();
        let deleted = state.written.len() as u64;
        state.written.clear();
        Ok(deleted)
    }

    fn close(&mut self) {
        let mut state = self.lock();
        state.close_calls += 1;
        state.open = false;
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }
}

/// Opener handing out clones of one `MockSink`, or failing.
#[derive(Debug, Clone, Default)]
pub struct MockSinkOpener {
    sink: MockSink,
    fail: bool,
}

impl MockSinkOpener {
    pub fn new(sink: MockSink) -> Self {
        Self { sink, fail: false }
    }

    /// An opener whose every `open` fails with a connection error.
    pub fn unreachable() -> Self {
        Self {
            sink: MockSink::new(),
            fail: true,
        }
    }

    pub fn sink(&self) -> &MockSink {
        &self.sink
    }
}

impl SinkOpener for MockSinkOpener {
    type Sink = MockSink;

    fn open(&self) -> Result<MockSink, SinkError> {
        if self.fail {
            return Err(SinkError::Connection {
                target: "mock".to_string(),
                source: simulated_outage(),
            });
        }
        self.sink.lock().open = true;
        Ok(self.sink.clone())
    }
}
