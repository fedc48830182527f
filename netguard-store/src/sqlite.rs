//! Embedded SQLite store.

use std::collections::BTreeMap;
use std::time::Duration;

use netguard_clock::Clock;
use netguard_schema::{NewRecord, PacketRecord, Protocol, RecordId};
use rusqlite::hooks::{AuthAction, AuthContext, Authorization};
use rusqlite::types::ValueRef;
use rusqlite::{params, Batch, Connection, ErrorCode};

use crate::config::{StoreConfig, StoreLocation};
use crate::sink::{Cell, QueryRows, RecordReader, Sink, SinkError, SinkOpener, SourceCount};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS packet_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    src_ip      TEXT    NOT NULL,
    dst_ip      TEXT    NOT NULL,
    protocol    TEXT    NOT NULL,
    length      INTEGER NOT NULL,
    flags       TEXT    NOT NULL DEFAULT '',
    captured_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_packet_logs_captured_at ON packet_logs (captured_at);
";

/// Whether an error means the connection itself is unusable.
fn is_transient(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => matches!(
            e.code,
            ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::CannotOpen
        ),
        _ => false,
    }
}

/// The store never attaches databases or manages transactions, so no
/// statement prepared on its connections may either.
fn authorize(ctx: AuthContext<'_>) -> Authorization {
    match ctx.action {
        AuthAction::Attach { .. }
        | AuthAction::Detach { .. }
        | AuthAction::Transaction { .. }
        | AuthAction::Savepoint { .. } => Authorization::Deny,
        _ => Authorization::Allow,
    }
}

fn prepare_error(sql: &str, err: rusqlite::Error) -> SinkError {
    if err.sqlite_error_code() == Some(ErrorCode::AuthorizationForStatementDenied) {
        SinkError::ReadOnly(sql.to_string())
    } else {
        SinkError::Query(err)
    }
}

fn to_i64(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn open_connection(
    location: &StoreLocation,
    busy_timeout: Duration,
) -> Result<Connection, rusqlite::Error> {
    let conn = match location {
        StoreLocation::File(path) => Connection::open(path)?,
        StoreLocation::Memory => Connection::open_in_memory()?,
    };
    conn.busy_timeout(busy_timeout)?;
    // In-memory databases answer "memory"; either way the pragma is harmless.
    let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    conn.execute_batch(SCHEMA)?;
    conn.authorizer(Some(authorize));
    Ok(conn)
}

/// Durable record store backed by an embedded SQLite database.
///
/// Each instance owns at most one connection. Timestamps come from the
/// sink's clock, never from the producer.
pub struct SqliteSink<C: Clock> {
    location: StoreLocation,
    busy_timeout: Duration,
    clock: C,
    conn: Option<Connection>,
}

impl<C: Clock> SqliteSink<C> {
    /// Create an unopened sink.
    pub fn new(location: StoreLocation, busy_timeout: Duration, clock: C) -> Self {
        Self {
            location,
            busy_timeout,
            clock,
            conn: None,
        }
    }

    /// Create and open a sink for `config`.
    pub fn connect(config: &StoreConfig, clock: C) -> Result<Self, SinkError> {
        let mut sink = Self::new(config.location(), config.busy_timeout(), clock);
        sink.open()?;
        Ok(sink)
    }

    /// Create and open a private in-memory sink.
    pub fn open_in_memory(clock: C) -> Result<Self, SinkError> {
        let mut sink = Self::new(
            StoreLocation::Memory,
            Duration::from_millis(crate::config::DEFAULT_BUSY_TIMEOUT_MS),
            clock,
        );
        sink.open()?;
        Ok(sink)
    }

    /// Connect and make sure the schema exists. Existing data is kept.
    ///
    /// Opening an already open sink is a no-op.
    pub fn open(&mut self) -> Result<(), SinkError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = open_connection(&self.location, self.busy_timeout).map_err(|source| {
            SinkError::Connection {
                target: self.location.describe(),
                source,
            }
        })?;
        self.conn = Some(conn);
        Ok(())
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    fn conn(&self) -> Result<&Connection, SinkError> {
        self.conn.as_ref().ok_or(SinkError::NotConnected)
    }

    fn insert(conn: &Connection, clock: &C, record: &NewRecord) -> Result<RecordId, rusqlite::Error> {
        let captured_at = clock.now_unix_sec() as i64;
        conn.execute(
            "INSERT INTO packet_logs (src_ip, dst_ip, protocol, length, flags, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.src_ip(),
                record.dst_ip(),
                record.protocol().as_str(),
                record.length() as i64,
                record.flags(),
                captured_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn reconnect(&mut self) -> Result<(), rusqlite::Error> {
        self.conn = None;
        self.conn = Some(open_connection(&self.location, self.busy_timeout)?);
        Ok(())
    }
}

impl<C: Clock> Sink for SqliteSink<C> {
    fn write(&mut self, record: &NewRecord) -> Result<RecordId, SinkError> {
        if let Some(conn) = self.conn.as_ref() {
            match Self::insert(conn, &self.clock, record) {
                Ok(id) => return Ok(id),
                Err(e) if !is_transient(&e) => return Err(SinkError::Write(e)),
                Err(_) => {}
            }
        }

        // One reconnect, one retry.
        self.reconnect().map_err(SinkError::Write)?;
        let conn = self.conn()?;
        Self::insert(conn, &self.clock, record).map_err(SinkError::Write)
    }

    fn clear(&mut self) -> Result<u64, SinkError> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM packet_logs", [])
            .map_err(SinkError::Clear)?;
        Ok(deleted as u64)
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            // A failed close still releases the handle on drop.
            let _ = conn.close();
        }
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }
}

impl<C: Clock> RecordReader for SqliteSink<C> {
    fn count_total(&self) -> Result<u64, SinkError> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM packet_logs", [], |row| row.get(0))
            .map_err(SinkError::Query)?;
        Ok(count as u64)
    }

    fn count_by_protocol(&self) -> Result<BTreeMap<Protocol, u64>, SinkError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT UPPER(TRIM(protocol)), COUNT(*) FROM packet_logs
                 GROUP BY UPPER(TRIM(protocol))",
            )
            .map_err(SinkError::Query)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(SinkError::Query)?;

        let mut counts: BTreeMap<Protocol, u64> = Protocol::ALL.iter().map(|p| (*p, 0)).collect();
        for row in rows {
            let (raw, count) = row.map_err(SinkError::Query)?;
            *counts.entry(Protocol::from_raw(&raw)).or_insert(0) += count as u64;
        }
        Ok(counts)
    }

    fn count_since(&self, window_secs: u64) -> Result<u64, SinkError> {
        let since = self.clock.now_unix_sec().saturating_sub(window_secs) as i64;
        let count: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM packet_logs WHERE captured_at >= ?1",
                params![since],
                |row| row.get(0),
            )
            .map_err(SinkError::Query)?;
        Ok(count as u64)
    }

    fn top_sources(&self, limit: usize) -> Result<Vec<SourceCount>, SinkError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT src_ip, COUNT(*) AS hits FROM packet_logs
                 GROUP BY src_ip
                 ORDER BY hits DESC, src_ip ASC
                 LIMIT ?1",
            )
            .map_err(SinkError::Query)?;
        let rows = stmt
            .query_map(params![to_i64(limit)], |row| {
                Ok(SourceCount {
                    src_ip: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })
            .map_err(SinkError::Query)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(SinkError::Query)
    }

    fn recent(&self, limit: usize) -> Result<Vec<PacketRecord>, SinkError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, src_ip, dst_ip, protocol, length, flags, captured_at
                 FROM packet_logs
                 ORDER BY id DESC
                 LIMIT ?1",
            )
            .map_err(SinkError::Query)?;
        let rows = stmt
            .query_map(params![to_i64(limit)], |row| {
                Ok(PacketRecord {
                    id: row.get(0)?,
                    src_ip: row.get(1)?,
                    dst_ip: row.get(2)?,
                    protocol: Protocol::from_raw(&row.get::<_, String>(3)?),
                    length: row.get::<_, i64>(4)?.max(0) as u64,
                    flags: row.get(5)?,
                    captured_at: row.get::<_, i64>(6)?.max(0) as u64,
                })
            })
            .map_err(SinkError::Query)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(SinkError::Query)
    }

    fn query(&self, sql: &str) -> Result<QueryRows, SinkError> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(SinkError::ReadOnly("empty statement".to_string()));
        }

        let conn = self.conn()?;
        let mut batch = Batch::new(conn, sql);
        let mut stmt = match batch.next() {
            Ok(Some(stmt)) => stmt,
            Ok(None) => return Err(SinkError::ReadOnly("empty statement".to_string())),
            Err(e) => return Err(prepare_error(sql, e)),
        };
        // Anything after the first statement is rejected, not skipped.
        if !matches!(batch.next(), Ok(None)) {
            return Err(SinkError::ReadOnly(sql.to_string()));
        }
        if !stmt.readonly() {
            return Err(SinkError::ReadOnly(sql.to_string()));
        }

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();
        let mut rows = stmt.query([]).map_err(SinkError::Query)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(SinkError::Query)? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                let cell = match row.get_ref(i).map_err(SinkError::Query)? {
                    ValueRef::Null => Cell::Null,
                    ValueRef::Integer(v) => Cell::Integer(v),
                    ValueRef::Real(v) => Cell::Real(v),
                    ValueRef::Text(v) => Cell::Text(String::from_utf8_lossy(v).into_owned()),
                    ValueRef::Blob(v) => Cell::Blob(v.to_vec()),
                };
                cells.push(cell);
            }
            out.push(cells);
        }

        Ok(QueryRows { columns, rows: out })
    }
}

/// Opens `SqliteSink`s that share a location and clock.
#[derive(Debug, Clone)]
pub struct SqliteOpener<C: Clock + Clone> {
    location: StoreLocation,
    busy_timeout: Duration,
    clock: C,
}

impl<C: Clock + Clone> SqliteOpener<C> {
    pub fn new(config: &StoreConfig, clock: C) -> Self {
        Self {
            location: config.location(),
            busy_timeout: config.busy_timeout(),
            clock,
        }
    }

    pub fn with_location(location: StoreLocation, busy_timeout: Duration, clock: C) -> Self {
        Self {
            location,
            busy_timeout,
            clock,
        }
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }
}

impl<C: Clock + Clone + 'static> SinkOpener for SqliteOpener<C> {
    type Sink = SqliteSink<C>;

    fn open(&self) -> Result<SqliteSink<C>, SinkError> {
        let mut sink = SqliteSink::new(self.location.clone(), self.busy_timeout, self.clock.clone());
        sink.open()?;
        Ok(sink)
    }
}
