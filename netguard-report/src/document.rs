//! Paginated HTML report document.

use std::fmt::{self, Write};
use std::ops::Range;

use netguard_clock::format_timestamp;
use netguard_schema::PacketRecord;
use netguard_stats::Summary;

pub const REPORT_TITLE: &str = "NetGuard Security Report";

/// Shown in place of the chart when there is no data to plot.
pub const NO_CHART_PLACEHOLDER: &str = "(No data available for chart)";

/// Record rows on the first page, after the summary and chart.
pub const FIRST_PAGE_ROWS: usize = 12;

/// Record rows on every following page.
pub const PAGE_ROWS: usize = 30;

const STYLE: &str = "
body { font-family: Helvetica, Arial, sans-serif; margin: 0; color: #222; }
.page { width: 190mm; min-height: 270mm; margin: 10mm auto; position: relative; page-break-after: always; }
.page:last-child { page-break-after: auto; }
header h1 { font-size: 18pt; margin: 0; text-align: center; }
header p { font-size: 9pt; margin: 2mm 0 6mm; text-align: center; color: #555; }
h2 { font-size: 13pt; margin: 6mm 0 3mm; }
table { border-collapse: collapse; width: 100%; font-size: 9pt; }
th, td { border: 1px solid #999; padding: 1.5mm 2mm; text-align: left; }
th { background: #e2e8f0; }
.placeholder { font-style: italic; color: #777; }
footer { position: absolute; bottom: 0; width: 100%; text-align: center; font-size: 8pt; color: #555; }
";

/// Everything a report shows, already queried.
#[derive(Debug, Clone)]
pub struct ReportData {
    /// Unix seconds.
    pub generated_at: u64,
    pub summary: Summary,
    /// Inline SVG, or `None` to show the placeholder.
    pub chart_svg: Option<String>,
    /// Newest first.
    pub records: Vec<PacketRecord>,
    /// How many records were requested; shown in the section title.
    pub records_limit: usize,
}

/// Split `total` rows into page ranges.
///
/// There is always at least one page, even with no rows.
pub fn paginate(total: usize) -> Vec<Range<usize>> {
    let first = total.min(FIRST_PAGE_ROWS);
    let mut pages = vec![0..first];
    let mut start = first;
    while start < total {
        let end = (start + PAGE_ROWS).min(total);
        pages.push(start..end);
        start = end;
    }
    pages
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn write_header(out: &mut String, generated: &str) -> fmt::Result {
    writeln!(out, "<header>")?;
    writeln!(out, "<h1>{}</h1>", REPORT_TITLE)?;
    writeln!(out, "<p>Generated on: {}</p>", generated)?;
    writeln!(out, "</header>")
}

fn write_footer(out: &mut String, page: usize) -> fmt::Result {
    writeln!(out, "<footer>Page {}</footer>", page)
}

fn write_summary(out: &mut String, summary: &Summary) -> fmt::Result {
    writeln!(out, "<h2>Executive Summary</h2>")?;
    writeln!(out, "<table class=\"summary\">")?;
    writeln!(out, "<tr><th>Metric</th><th>Count</th></tr>")?;
    writeln!(out, "<tr><td>Total Packets</td><td>{}</td></tr>", summary.total)?;
    writeln!(out, "<tr><td>TCP Packets</td><td>{}</td></tr>", summary.tcp)?;
    writeln!(out, "<tr><td>UDP Packets</td><td>{}</td></tr>", summary.udp)?;
    writeln!(out, "</table>")
}

fn write_chart(out: &mut String, chart: Option<&str>) -> fmt::Result {
    writeln!(out, "<h2>Traffic Analysis Chart</h2>")?;
    match chart {
        Some(svg) => writeln!(out, "<figure>{}</figure>", svg),
        None => writeln!(out, "<p class=\"placeholder\">{}</p>", NO_CHART_PLACEHOLDER),
    }
}

fn write_records(out: &mut String, records: &[PacketRecord]) -> fmt::Result {
    writeln!(out, "<table class=\"records\">")?;
    writeln!(
        out,
        "<thead><tr><th>Timestamp</th><th>Source IP</th><th>Dest IP</th><th>Proto</th><th>Len</th></tr></thead>"
    )?;
    writeln!(out, "<tbody>")?;
    for r in records {
        writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            format_timestamp(r.captured_at),
            escape_html(&r.src_ip),
            escape_html(&r.dst_ip),
            r.protocol,
            r.length
        )?;
    }
    writeln!(out, "</tbody>")?;
    writeln!(out, "</table>")
}

/// Render the whole document.
pub fn render_document(data: &ReportData) -> Result<String, fmt::Error> {
    let generated = format_timestamp(data.generated_at);
    let pages = paginate(data.records.len());
    let mut out = String::new();

    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\">")?;
    writeln!(out, "<head>")?;
    writeln!(out, "<meta charset=\"utf-8\">")?;
    writeln!(out, "<title>{} - {}</title>", REPORT_TITLE, generated)?;
    writeln!(out, "<style>{}</style>", STYLE)?;
    writeln!(out, "</head>")?;
    writeln!(out, "<body>")?;

    for (index, range) in pages.iter().enumerate() {
        let number = index + 1;
        writeln!(out, "<section class=\"page\" id=\"page-{}\">", number)?;
        write_header(&mut out, &generated)?;

        if index == 0 {
            write_summary(&mut out, &data.summary)?;
            write_chart(&mut out, data.chart_svg.as_deref())?;
            writeln!(
                out,
                "<h2>Recent Suspicious Activity (Last {} Logs)</h2>",
                data.records_limit
            )?;
        }

        write_records(&mut out, &data.records[range.clone()])?;
        write_footer(&mut out, number)?;
        writeln!(out, "</section>")?;
    }

    writeln!(out, "</body>")?;
    writeln!(out, "</html>")?;
    Ok(out)
}
