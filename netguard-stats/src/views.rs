//! Read-only views over a `RecordReader`.

use netguard_schema::{PacketRecord, Protocol};
use netguard_store::{RecordReader, SinkError, SourceCount};
use serde::Serialize;
use thiserror::Error;

/// Trailing window for the live-rate view, in seconds.
pub const DEFAULT_WINDOW_SECS: u64 = 10;

/// Number of source addresses in the top-talkers view.
pub const DEFAULT_TOP_N: usize = 5;

/// Recent records shown on the dashboard.
pub const DEFAULT_DASHBOARD_RECENT: usize = 5;

/// Recent records shown by the logs view.
pub const DEFAULT_LOGS_LIMIT: usize = 100;

/// Recent records in an exported report.
pub const DEFAULT_REPORT_RECENT: usize = 50;

/// Errors from aggregation queries.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("{what} limit must be at least 1")]
    InvalidLimit { what: &'static str },
}

fn check_limit(limit: usize, what: &'static str) -> Result<usize, QueryError> {
    if limit == 0 {
        return Err(QueryError::InvalidLimit { what });
    }
    Ok(limit)
}

/// Record counts: total and per canonical protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: u64,
    pub tcp: u64,
    pub udp: u64,
    pub other: u64,
}

impl Summary {
    pub fn count(&self, protocol: Protocol) -> u64 {
        match protocol {
            Protocol::Tcp => self.tcp,
            Protocol::Udp => self.udp,
            Protocol::Other => self.other,
        }
    }
}

/// One protocol's share of all records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolShare {
    pub protocol: Protocol,
    pub count: u64,
    /// 0.0 to 100.0. Zero when the store is empty.
    pub percent: f64,
}

/// Parameters for the dashboard view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewConfig {
    pub window_secs: u64,
    pub top_n: usize,
    pub recent_n: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            top_n: DEFAULT_TOP_N,
            recent_n: DEFAULT_DASHBOARD_RECENT,
        }
    }
}

/// Everything one dashboard refresh shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub summary: Summary,
    pub mix: Vec<ProtocolShare>,
    pub window_secs: u64,
    pub window_count: u64,
    pub top_sources: Vec<SourceCount>,
    pub recent: Vec<PacketRecord>,
}

/// Total and per-protocol counts.
pub fn summary<R: RecordReader + ?Sized>(reader: &R) -> Result<Summary, QueryError> {
    let total = reader.count_total()?;
    let by_protocol = reader.count_by_protocol()?;
    let get = |p: Protocol| by_protocol.get(&p).copied().unwrap_or(0);

    Ok(Summary {
        total,
        tcp: get(Protocol::Tcp),
        udp: get(Protocol::Udp),
        other: get(Protocol::Other),
    })
}

/// Per-protocol counts with percentage shares, in canonical order.
pub fn protocol_mix<R: RecordReader + ?Sized>(reader: &R) -> Result<Vec<ProtocolShare>, QueryError> {
    let by_protocol = reader.count_by_protocol()?;
    let total: u64 = by_protocol.values().sum();

    Ok(Protocol::ALL
        .iter()
        .map(|&protocol| {
            let count = by_protocol.get(&protocol).copied().unwrap_or(0);
            let percent = if total == 0 {
                0.0
            } else {
                count as f64 * 100.0 / total as f64
            };
            ProtocolShare {
                protocol,
                count,
                percent,
            }
        })
        .collect())
}

/// Records captured in the last `window_secs` of the store's clock.
pub fn trailing_window<R: RecordReader + ?Sized>(
    reader: &R,
    window_secs: u64,
) -> Result<u64, QueryError> {
    Ok(reader.count_since(window_secs)?)
}

/// Top `limit` source addresses by count, ties broken by address.
pub fn top_sources<R: RecordReader + ?Sized>(
    reader: &R,
    limit: usize,
) -> Result<Vec<SourceCount>, QueryError> {
    Ok(reader.top_sources(check_limit(limit, "top sources")?)?)
}

/// Most recent `limit` records, newest first.
pub fn recent<R: RecordReader + ?Sized>(
    reader: &R,
    limit: usize,
) -> Result<Vec<PacketRecord>, QueryError> {
    Ok(reader.recent(check_limit(limit, "recent records")?)?)
}

/// All dashboard views in one call.
pub fn dashboard<R: RecordReader + ?Sized>(
    reader: &R,
    config: &ViewConfig,
) -> Result<DashboardSnapshot, QueryError> {
    Ok(DashboardSnapshot {
        summary: summary(reader)?,
        mix: protocol_mix(reader)?,
        window_secs: config.window_secs,
        window_count: trailing_window(reader, config.window_secs)?,
        top_sources: top_sources(reader, config.top_n)?,
        recent: recent(reader, config.recent_n)?,
    })
}
