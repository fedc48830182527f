//! Report export with atomic replacement of the destination.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use netguard_clock::Clock;
use netguard_stats::{recent, summary, top_sources, QueryError, DEFAULT_REPORT_RECENT, DEFAULT_TOP_N};
use netguard_store::RecordReader;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::chart::render_top_sources_chart;
use crate::document::{paginate, render_document, ReportData};

/// Errors from report export. Any of them leaves the destination untouched.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("report query failed: {0}")]
    Query(#[from] QueryError),

    #[error("report rendering failed: {0}")]
    Render(#[from] fmt::Error),

    #[error("invalid destination {0}: must be a file path")]
    InvalidDestination(PathBuf),

    #[error("failed to write report to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What to put in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub top_n: usize,
    pub recent_n: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            recent_n: DEFAULT_REPORT_RECENT,
        }
    }
}

/// Outcome of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub records: usize,
    pub pages: usize,
    pub has_chart: bool,
    pub bytes: usize,
}

/// Query the store, render the report and write it to `destination`.
///
/// The document is written to a temporary file beside `destination` and
/// renamed over it only once complete.
pub fn export<R, C>(
    reader: &R,
    clock: &C,
    destination: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary, ExportError>
where
    R: RecordReader + ?Sized,
    C: Clock + ?Sized,
{
    if destination.file_name().is_none() || destination.is_dir() {
        return Err(ExportError::InvalidDestination(destination.to_path_buf()));
    }

    let top = top_sources(reader, options.top_n)?;
    let chart_svg = render_top_sources_chart(&top);
    let counts = summary(reader)?;
    let records = recent(reader, options.recent_n)?;

    let data = ReportData {
        generated_at: clock.now_unix_sec(),
        summary: counts,
        chart_svg,
        records,
        records_limit: options.recent_n,
    };
    let html = render_document(&data)?;

    write_atomic(destination, html.as_bytes())?;

    Ok(ExportSummary {
        path: destination.to_path_buf(),
        records: data.records.len(),
        pages: paginate(data.records.len()).len(),
        has_chart: data.chart_svg.is_some(),
        bytes: html.len(),
    })
}

/// Write `bytes` to a temp file in the destination's directory, then rename.
/// The temp file is removed on every failure path.
fn write_atomic(destination: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let write_err = |source: io::Error| ExportError::Write {
        path: destination.to_path_buf(),
        source,
    };

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(destination).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NO_CHART_PLACEHOLDER;
    use netguard_clock::MockClock;
    use netguard_schema::NewRecord;
    use netguard_store::{Sink, SqliteSink};
    use std::fs;
    use tempfile::TempDir;

    fn store_with(n: usize) -> SqliteSink<MockClock> {
        let mut sink = SqliteSink::open_in_memory(MockClock::new(1_704_067_200)).expect("store");
        for i in 0..n {
            let src = format!("10.0.0.{}", i % 7);
            let record = NewRecord::new(&src, "10.0.0.254", "TCP", 60, "S").expect("valid");
            sink.write(&record).expect("write");
        }
        sink
    }

    fn dir_entries(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .expect("read dir")
            .map(|e| e.expect("entry").path())
            .collect()
    }

    #[test]
    fn test_export_empty_store_uses_placeholder() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path().join("report.html");
        let store = store_with(0);

        let result = export(&store, &MockClock::new(0), &out, &ExportOptions::default())
            .expect("export");

        assert!(!result.has_chart);
        assert_eq!(result.records, 0);
        assert_eq!(result.pages, 1);
        let html = fs::read_to_string(&out).expect("read report");
        assert!(html.contains(NO_CHART_PLACEHOLDER));
        assert!(!html.contains("<svg"));
    }

    #[test]
    fn test_export_with_data() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path().join("report.html");
        let store = store_with(60);

        let result = export(&store, &MockClock::new(0), &out, &ExportOptions::default())
            .expect("export");

        assert!(result.has_chart);
        assert_eq!(result.records, 50);
        assert_eq!(result.pages, 3);

        let html = fs::read_to_string(&out).expect("read report");
        assert!(html.contains("<svg"));
        assert!(html.contains("<td>Total Packets</td><td>60</td>"));
        assert!(html.contains("Page 3"));
        assert_eq!(dir_entries(dir.path()), vec![out]);
    }

    #[test]
    fn test_export_replaces_existing_file() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path().join("report.html");
        fs::write(&out, "old").expect("seed");

        export(&store_with(1), &MockClock::new(0), &out, &ExportOptions::default())
            .expect("export");

        let html = fs::read_to_string(&out).expect("read report");
        assert!(html.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_export_query_failure_leaves_destination_untouched() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path().join("report.html");
        fs::write(&out, "previous report").expect("seed");

        let mut store = store_with(3);
        store.close();

        let err = export(&store, &MockClock::new(0), &out, &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, ExportError::Query(_)));
        assert_eq!(fs::read_to_string(&out).expect("read"), "previous report");
        assert_eq!(dir_entries(dir.path()).len(), 1);
    }

    #[test]
    fn test_export_zero_limit_is_query_error() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path().join("report.html");
        let options = ExportOptions {
            top_n: 5,
            recent_n: 0,
        };

        let err = export(&store_with(3), &MockClock::new(0), &out, &options).unwrap_err();
        assert!(matches!(err, ExportError::Query(QueryError::InvalidLimit { .. })));
        assert!(!out.exists());
    }

    #[test]
    fn test_export_missing_directory_is_write_error() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path().join("missing").join("report.html");

        let err = export(&store_with(3), &MockClock::new(0), &out, &ExportOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::Write { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_export_to_directory_is_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let err = export(&store_with(1), &MockClock::new(0), dir.path(), &ExportOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::InvalidDestination(_)));
    }

    #[test]
    fn test_export_is_reproducible() {
        let dir = TempDir::new().expect("tempdir");
        let a = dir.path().join("a.html");
        let b = dir.path().join("b.html");
        let store = store_with(20);
        let clock = MockClock::new(1_704_067_200);

        export(&store, &clock, &a, &ExportOptions::default()).expect("export a");
        export(&store, &clock, &b, &ExportOptions::default()).expect("export b");

        assert_eq!(
            fs::read_to_string(&a).expect("read a"),
            fs::read_to_string(&b).expect("read b")
        );
    }
}
