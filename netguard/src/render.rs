//! Plain-text output for the terminal.

use std::io::{self, Write};

use netguard_clock::{format_time_of_day, format_timestamp};
use netguard_schema::PacketRecord;
use netguard_stats::{DashboardSnapshot, ProtocolShare, Summary, TrafficHistory};
use netguard_store::{QueryRows, SourceCount};

/// One record as a fixed-width table row.
pub fn record_line(record: &PacketRecord) -> String {
    format!(
        "{:<19}  {:<15}  {:<15}  {:<5}  {:>6}  {}",
        format_timestamp(record.captured_at),
        record.src_ip,
        record.dst_ip,
        record.protocol,
        record.length,
        record.flags
    )
}

/// Records table with a header line.
pub fn write_records<W: Write>(out: &mut W, records: &[PacketRecord]) -> io::Result<()> {
    writeln!(
        out,
        "{:<19}  {:<15}  {:<15}  {:<5}  {:>6}  {}",
        "Timestamp", "Source IP", "Dest IP", "Proto", "Len", "Flags"
    )?;
    for record in records {
        writeln!(out, "{}", record_line(record))?;
    }
    Ok(())
}

pub fn write_summary<W: Write>(out: &mut W, summary: &Summary) -> io::Result<()> {
    writeln!(
        out,
        "Total: {}  TCP: {}  UDP: {}  OTHER: {}",
        summary.total, summary.tcp, summary.udp, summary.other
    )
}

fn mix_line(mix: &[ProtocolShare]) -> String {
    mix.iter()
        .map(|s| format!("{} {:.1}%", s.protocol, s.percent))
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn write_top_sources<W: Write>(out: &mut W, sources: &[SourceCount]) -> io::Result<()> {
    if sources.is_empty() {
        return writeln!(out, "  (no traffic yet)");
    }
    for (rank, source) in sources.iter().enumerate() {
        writeln!(out, "  {:>2}. {:<15}  {}", rank + 1, source.src_ip, source.count)?;
    }
    Ok(())
}

/// Full one-shot statistics view.
pub fn write_stats<W: Write>(out: &mut W, snapshot: &DashboardSnapshot) -> io::Result<()> {
    write_summary(out, &snapshot.summary)?;
    writeln!(out, "Mix:   {}", mix_line(&snapshot.mix))?;
    writeln!(
        out,
        "Last {}s: {} packets",
        snapshot.window_secs, snapshot.window_count
    )?;
    writeln!(out)?;
    writeln!(out, "Top sources:")?;
    write_top_sources(out, &snapshot.top_sources)?;
    writeln!(out)?;
    writeln!(out, "Recent:")?;
    write_records(out, &snapshot.recent)
}

/// One dashboard refresh.
pub fn write_dashboard<W: Write>(
    out: &mut W,
    snapshot: &DashboardSnapshot,
    history: &TrafficHistory,
) -> io::Result<()> {
    let at = history.latest().map(|s| s.at).unwrap_or(0);
    writeln!(
        out,
        "[{}] total={} tcp={} udp={} other={} | last {}s: {} {}",
        format_time_of_day(at),
        snapshot.summary.total,
        snapshot.summary.tcp,
        snapshot.summary.udp,
        snapshot.summary.other,
        snapshot.window_secs,
        snapshot.window_count,
        history.sparkline()
    )?;
    writeln!(out, "  mix: {}", mix_line(&snapshot.mix))?;
    let top = snapshot
        .top_sources
        .iter()
        .map(|s| format!("{} ({})", s.src_ip, s.count))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(out, "  top: {}", if top.is_empty() { "-" } else { &top })?;
    for record in &snapshot.recent {
        writeln!(out, "    {}", record_line(record))?;
    }
    out.flush()
}

/// Free-form query result as tab-separated text with a header line.
pub fn write_query_rows<W: Write>(out: &mut W, rows: &QueryRows) -> io::Result<()> {
    writeln!(out, "{}", rows.columns.join("\t"))?;
    for row in &rows.rows {
        let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        writeln!(out, "{}", cells.join("\t"))?;
    }
    Ok(())
}
