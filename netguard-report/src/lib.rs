//! NetGuard report export.
//!
//! Snapshots the aggregation views into one self-contained, paginated HTML
//! document with an inline SVG chart of the top source addresses.

mod chart;
mod document;
mod exporter;

pub use chart::{render_top_sources_chart, CHART_HEIGHT, CHART_WIDTH};
pub use document::{
    escape_html, paginate, render_document, ReportData, FIRST_PAGE_ROWS, NO_CHART_PLACEHOLDER,
    PAGE_ROWS, REPORT_TITLE,
};
pub use exporter::{export, ExportError, ExportOptions, ExportSummary};
