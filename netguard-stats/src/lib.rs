//! NetGuard aggregation views.
//!
//! Every view is computed on demand from the store; nothing is cached.
//! `TrafficHistory` is the one piece of consumer-side state: a short rolling
//! series of trailing-window samples.

mod history;
mod views;

pub use history::{Sample, TrafficHistory, HISTORY_CAPACITY};
pub use views::{
    dashboard, protocol_mix, recent, summary, top_sources, trailing_window, DashboardSnapshot,
    ProtocolShare, QueryError, Summary, ViewConfig, DEFAULT_DASHBOARD_RECENT, DEFAULT_LOGS_LIMIT,
    DEFAULT_REPORT_RECENT, DEFAULT_TOP_N, DEFAULT_WINDOW_SECS,
};
