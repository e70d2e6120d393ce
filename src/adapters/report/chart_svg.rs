//! SVG line charts for NAV, drawdown and rolling volatility.

use super::write_file;
use crate::domain::error::BacktestError;
use crate::domain::stats::BacktestAnalysis;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

const WIDTH: f64 = 600.0;
const HEIGHT: f64 = 240.0;
const PADDING: f64 = 40.0;

#[derive(Debug, Default)]
pub struct SvgChartAdapter;

impl SvgChartAdapter {
    pub fn new() -> Self {
        SvgChartAdapter
    }
}

/// Render `(date, value)` points as a single polyline with axes and a title.
///
/// The x axis is the point index, so gaps between dates are not stretched.
pub fn render_line_chart(title: &str, color: &str, points: &[(NaiveDate, f64)]) -> String {
    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH:.0}\" height=\"{HEIGHT:.0}\" viewBox=\"0 0 {WIDTH:.0} {HEIGHT:.0}\">\n"
    );
    svg.push_str(&format!(
        "  <rect width=\"{WIDTH:.0}\" height=\"{HEIGHT:.0}\" fill=\"white\"/>\n"
    ));
    svg.push_str(&format!(
        "  <text x=\"{:.0}\" y=\"{:.0}\" font-size=\"14\" text-anchor=\"middle\">{}</text>\n",
        WIDTH / 2.0,
        PADDING / 2.0,
        title
    ));

    let plot_width = WIDTH - 2.0 * PADDING;
    let plot_height = HEIGHT - 2.0 * PADDING;
    svg.push_str(&format!(
        "  <line x1=\"{PADDING:.0}\" y1=\"{PADDING:.0}\" x2=\"{PADDING:.0}\" y2=\"{:.0}\" stroke=\"black\"/>\n",
        HEIGHT - PADDING
    ));
    svg.push_str(&format!(
        "  <line x1=\"{PADDING:.0}\" y1=\"{:.0}\" x2=\"{:.0}\" y2=\"{:.0}\" stroke=\"black\"/>\n",
        HEIGHT - PADDING,
        WIDTH - PADDING,
        HEIGHT - PADDING
    ));

    if points.is_empty() {
        svg.push_str("  <!-- no data -->\n</svg>\n");
        return svg;
    }

    let min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    let scale_y = if range > 0.0 { plot_height / range } else { 1.0 };
    let scale_x = if points.len() > 1 {
        plot_width / (points.len() - 1) as f64
    } else {
        0.0
    };

    let coords: Vec<String> = points
        .iter()
        .enumerate()
        .map(|(i, &(_, value))| {
            let x = PADDING + i as f64 * scale_x;
            let y = HEIGHT - PADDING - (value - min) * scale_y;
            format!("{x:.1},{y:.1}")
        })
        .collect();

    svg.push_str(&format!(
        "  <polyline fill=\"none\" stroke=\"{color}\" stroke-width=\"1\" points=\"{}\"/>\n",
        coords.join(" ")
    ));

    let (first, last) = (points[0].0, points[points.len() - 1].0);
    svg.push_str(&format!(
        "  <text x=\"{PADDING:.0}\" y=\"{:.0}\" font-size=\"10\">{first}</text>\n",
        HEIGHT - PADDING / 2.0
    ));
    svg.push_str(&format!(
        "  <text x=\"{:.0}\" y=\"{:.0}\" font-size=\"10\" text-anchor=\"end\">{last}</text>\n",
        WIDTH - PADDING,
        HEIGHT - PADDING / 2.0
    ));
    svg.push_str(&format!(
        "  <text x=\"{:.0}\" y=\"{PADDING:.0}\" font-size=\"10\" text-anchor=\"end\">{max:.4}</text>\n",
        PADDING - 4.0
    ));
    svg.push_str(&format!(
        "  <text x=\"{:.0}\" y=\"{:.0}\" font-size=\"10\" text-anchor=\"end\">{min:.4}</text>\n",
        PADDING - 4.0,
        HEIGHT - PADDING
    ));
    svg.push_str("</svg>\n");
    svg
}

impl ReportPort for SvgChartAdapter {
    fn write(
        &self,
        analysis: &BacktestAnalysis,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, BacktestError> {
        let diagnostics = analysis.diagnostics()?;
        let label = analysis.label();

        let nav: Vec<(NaiveDate, f64)> = diagnostics.iter().map(|d| (d.date, d.nav)).collect();
        let underwater: Vec<(NaiveDate, f64)> =
            diagnostics.iter().map(|d| (d.date, d.drawdown)).collect();
        // Rolling volatility only exists once the window has filled.
        let volatility: Vec<(NaiveDate, f64)> = diagnostics
            .iter()
            .filter_map(|d| d.rolling_volatility.map(|v| (d.date, v)))
            .collect();

        let charts = [
            ("nav", "Net asset value", "steelblue", nav),
            ("underwater", "Drawdown", "firebrick", underwater),
            ("volatility", "Rolling volatility (21d, ann.)", "darkorange", volatility),
        ];

        let mut written = Vec::with_capacity(charts.len());
        for (prefix, title, color, points) in &charts {
            let svg = render_line_chart(title, color, points);
            written.push(write_file(output_dir, &format!("{prefix}_{label}.svg"), &svg)?);
        }
        Ok(written)
    }
}
