//! Persistent sink for NetGuard.
//!
//! This crate provides:
//! - `Sink` / `RecordReader` traits for the write and read sides of the store
//! - `SinkOpener` so each execution context opens a connection it alone owns
//! - `SqliteSink`, the embedded durable store, and its configuration

pub mod config;
pub mod sink;
pub mod sqlite;

pub use config::{StoreConfig, StoreLocation, DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_DATABASE};
pub use sink::{
    Cell, MockSink, MockSinkOpener, QueryRows, RecordReader, Sink, SinkError, SinkOpener,
    SourceCount,
};
pub use sqlite::{SqliteOpener, SqliteSink};
