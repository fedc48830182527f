//! Bar chart of the top source addresses.

use netguard_store::SourceCount;
use svg::node::element::{Line, Rectangle as Rect, Text};
use svg::Document;

pub const CHART_WIDTH: u32 = 640;
pub const CHART_HEIGHT: u32 = 320;

const MARGIN_LEFT: u32 = 48;
const MARGIN_RIGHT: u32 = 16;
const MARGIN_TOP: u32 = 24;
const MARGIN_BOTTOM: u32 = 56;
const BAR_COLOR: &str = "#2b6cb0";

/// Render a vertical bar chart of `sources` as an SVG fragment.
///
/// Returns `None` when there is nothing to plot.
pub fn render_top_sources_chart(sources: &[SourceCount]) -> Option<String> {
    if sources.is_empty() {
        return None;
    }

    let peak = sources.iter().map(|s| s.count).max().unwrap_or(0).max(1);
    let plot_w = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let baseline = MARGIN_TOP + plot_h;
    let slot = plot_w as f64 / sources.len() as f64;
    let bar_w = slot * 0.6;

    let mut document = Document::new()
        .set("width", CHART_WIDTH)
        .set("height", CHART_HEIGHT)
        .set("viewBox", (0, 0, CHART_WIDTH, CHART_HEIGHT))
        .set("font-family", "sans-serif")
        .set("font-size", 11)
        .add(
            Text::new("Top Source IPs")
                .set("x", MARGIN_LEFT)
                .set("y", 16)
                .set("font-weight", "bold"),
        )
        .add(
            Line::new()
                .set("x1", MARGIN_LEFT)
                .set("y1", baseline)
                .set("x2", MARGIN_LEFT + plot_w)
                .set("y2", baseline)
                .set("stroke", "#333"),
        )
        .add(
            Line::new()
                .set("x1", MARGIN_LEFT)
                .set("y1", MARGIN_TOP)
                .set("x2", MARGIN_LEFT)
                .set("y2", baseline)
                .set("stroke", "#333"),
        )
        .add(
            Text::new(peak.to_string())
                .set("x", MARGIN_LEFT - 6)
                .set("y", MARGIN_TOP + 4)
                .set("text-anchor", "end"),
        )
        .add(
            Text::new("0")
                .set("x", MARGIN_LEFT - 6)
                .set("y", baseline)
                .set("text-anchor", "end"),
        );

    for (i, source) in sources.iter().enumerate() {
        let height = source.count as f64 / peak as f64 * plot_h as f64;
        let x = MARGIN_LEFT as f64 + slot * i as f64 + (slot - bar_w) / 2.0;
        let y = baseline as f64 - height;
        let center = x + bar_w / 2.0;

        document = document
            .add(
                Rect::new()
                    .set("x", x)
                    .set("y", y)
                    .set("width", bar_w)
                    .set("height", height)
                    .set("fill", BAR_COLOR),
            )
            .add(
                Text::new(source.count.to_string())
                    .set("x", center)
                    .set("y", y - 4.0)
                    .set("text-anchor", "middle"),
            )
            .add(
                Text::new(source.src_ip.clone())
                    .set("x", center)
                    .set("y", baseline + 16)
                    .set("text-anchor", "middle"),
            );
    }

    Some(document.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(ip: &str, count: u64) -> SourceCount {
        SourceCount {
            src_ip: ip.to_string(),
            count,
        }
    }

    #[test]
    fn test_chart_empty_is_none() {
        assert!(render_top_sources_chart(&[]).is_none());
    }

    #[test]
    fn test_chart_has_one_bar_per_source() {
        let svg = render_top_sources_chart(&[
            source("10.0.0.1", 9),
            source("10.0.0.2", 4),
            source("10.0.0.3", 1),
        ])
        .expect("chart");

        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<rect").count(), 3);
        assert!(svg.contains("10.0.0.2"));
        assert!(svg.contains("Top Source IPs"));
    }

    #[test]
    fn test_chart_is_deterministic() {
        let data = [source("10.0.0.1", 3), source("10.0.0.2", 3)];
        assert_eq!(
            render_top_sources_chart(&data),
            render_top_sources_chart(&data)
        );
    }
}
