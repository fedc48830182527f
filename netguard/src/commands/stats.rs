//! Stats command: one-shot aggregate views.

use std::io::Write;

use netguard_stats::{dashboard, DashboardSnapshot, ViewConfig};
use netguard_store::RecordReader;

use crate::cli::StatsArgs;
use crate::render;

use super::CommandResult;

/// Execute the stats command, writing text or JSON to `out`.
pub fn execute_stats<R, W>(args: &StatsArgs, reader: &R, out: &mut W) -> CommandResult<DashboardSnapshot>
where
    R: RecordReader + ?Sized,
    W: Write,
{
    args.validate()?;

    let view = ViewConfig {
        window_secs: args.window_sec,
        top_n: args.top,
        recent_n: args.recent,
    };
    let snapshot = dashboard(reader, &view)?;

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &snapshot).map_err(std::io::Error::from)?;
        writeln!(out)?;
    } else {
        render::write_stats(out, &snapshot)?;
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandError;
    use netguard_clock::MockClock;
    use netguard_schema::NewRecord;
    use netguard_store::{Sink, SqliteSink};

    fn args(json: bool) -> StatsArgs {
        StatsArgs {
            window_sec: 10,
            top: 5,
            recent: 5,
            json,
        }
    }

    fn seeded() -> SqliteSink<MockClock> {
        let mut sink = SqliteSink::open_in_memory(MockClock::new(1_704_067_200)).expect("store");
        for (src, proto) in [
            ("10.0.0.1", "TCP"),
            ("10.0.0.1", "TCP"),
            ("10.0.0.1", "TCP"),
            ("10.0.0.2", "UDP"),
            ("10.0.0.2", "UDP"),
            ("10.0.0.3", "ICMP"),
        ] {
            let record = NewRecord::new(src, "10.0.0.9", proto, 60, "").expect("valid");
            sink.write(&record).expect("write");
        }
        sink
    }

    #[test]
    fn test_stats_text() {
        let mut out = Vec::new();
        let snapshot = execute_stats(&args(false), &seeded(), &mut out).expect("stats");

        assert_eq!(snapshot.summary.total, 6);
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("Total: 6  TCP: 3  UDP: 2  OTHER: 1"));
        assert!(text.contains("1. 10.0.0.1"));
    }

    #[test]
    fn test_stats_json() {
        let mut out = Vec::new();
        execute_stats(&args(true), &seeded(), &mut out).expect("stats");

        let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(value["summary"]["total"], 6);
        assert_eq!(value["summary"]["other"], 1);
        assert_eq!(value["window_count"], 6);
        assert_eq!(value["top_sources"][0]["src_ip"], "10.0.0.1");
        assert_eq!(value["mix"][0]["protocol"], "TCP");
    }

    #[test]
    fn test_stats_rejects_zero_top() {
        let mut out = Vec::new();
        let err = execute_stats(&StatsArgs { top: 0, ..args(false) }, &seeded(), &mut out)
            .unwrap_err();
        assert!(matches!(err, CommandError::InvalidArgument(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_stats_closed_store_is_query_error() {
        let mut store = seeded();
        store.close();
        let err = execute_stats(&args(false), &store, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, CommandError::Query(_)));
    }
}
