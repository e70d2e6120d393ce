//! LaTeX summary table.
//!
//! One column per run, one row per metric. The transaction cost and
//! risk-free rate rows identify the run and are separated from the
//! performance rows by `\hline`.

use super::write_file;
use crate::domain::config_validation::DEFAULT_DATE_FORMAT;
use crate::domain::error::BacktestError;
use crate::domain::stats::{BacktestAnalysis, SummaryRecord};
use crate::ports::report_port::ReportPort;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CAPTION: &str = "Portfolio performance summary; daily rebalancing.";
pub const TABLE_FILE_NAME: &str = "table_summary.tex";

#[derive(Debug, Clone)]
pub struct LatexTableAdapter {
    caption: String,
}

impl Default for LatexTableAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTION)
    }
}

impl LatexTableAdapter {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
        }
    }

    fn summaries(analyses: &[BacktestAnalysis]) -> Result<Vec<SummaryRecord>, BacktestError> {
        analyses
            .iter()
            .map(|a| a.summary().cloned())
            .collect()
    }
}

fn pct(value: f64) -> String {
    format!("{:.2}\\%", 100.0 * value)
}

fn ratio(value: f64) -> String {
    format!("{value:.2}")
}

type RowFormatter = fn(&SummaryRecord) -> String;

const HEADER_ROWS: [(&str, RowFormatter); 2] = [
    ("Transaction Cost", |s| pct(s.transaction_cost)),
    ("Risk Free Rate", |s| pct(s.risk_free_rate)),
];

const BODY_ROWS: [(&str, RowFormatter); 8] = [
    ("Total Return", |s| pct(s.total_return)),
    ("Return (Ann.)", |s| pct(s.annualized_return)),
    ("Volatility (Ann.)", |s| pct(s.annualized_volatility)),
    ("Sharpe Ratio", |s| ratio(s.sharpe_ratio)),
    ("Sharpe Ratio (Ann.)", |s| ratio(s.annualized_sharpe_ratio)),
    ("Max Drawdown", |s| pct(s.max_drawdown)),
    ("Max Drawdown Date", |s| {
        s.max_drawdown_date.format(DEFAULT_DATE_FORMAT).to_string()
    }),
    ("Longest Drawdown (Days)", |s| s.longest_drawdown_days.to_string()),
];

fn push_row(out: &mut String, label: &str, formatter: RowFormatter, summaries: &[SummaryRecord]) {
    out.push_str(label);
    for summary in summaries {
        out.push_str(" & ");
        out.push_str(&formatter(summary));
    }
    out.push_str(" \\\\\n");
}

/// Render summaries as a floating LaTeX table.
pub fn render_summary_table(summaries: &[SummaryRecord], caption: &str) -> String {
    let mut out = String::new();
    out.push_str("\\begin{table}[p]\n");
    out.push_str("\\centering\n");
    out.push_str(&format!("\\caption{{{caption}}}\n"));
    out.push_str(&format!("\\begin{{tabular}}{{l{}}}\n", "r".repeat(summaries.len())));
    out.push_str("\\hline\n");

    for (label, formatter) in HEADER_ROWS {
        push_row(&mut out, label, formatter, summaries);
    }
    out.push_str("\\hline\n");
    for (label, formatter) in BODY_ROWS {
        push_row(&mut out, label, formatter, summaries);
    }

    out.push_str("\\hline\n");
    out.push_str("\\end{tabular}\n");
    out.push_str("\\end{table}\n");
    out
}

impl ReportPort for LatexTableAdapter {
    /// Single-run table named after the run label.
    fn write(
        &self,
        analysis: &BacktestAnalysis,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, BacktestError> {
        let summaries = Self::summaries(std::slice::from_ref(analysis))?;
        let content = render_summary_table(&summaries, &self.caption);
        let path = write_file(
            output_dir,
            &format!("table_summary_{}.tex", analysis.label()),
            &content,
        )?;
        Ok(vec![path])
    }

    /// Every run as one column of a single table.
    fn write_all(
        &self,
        analyses: &[BacktestAnalysis],
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, BacktestError> {
        let summaries = Self::summaries(analyses)?;
        let content = render_summary_table(&summaries, &self.caption);
        let path = write_file(output_dir, TABLE_FILE_NAME, &content)?;
        info!(runs = summaries.len(), path = %path.display(), "wrote latex table");
        Ok(vec![path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn summary(transaction_cost: f64, risk_free_rate: f64) -> SummaryRecord {
        SummaryRecord {
            transaction_cost,
            risk_free_rate,
            total_return: 0.1234,
            annualized_return: 0.05,
            annualized_volatility: 0.2,
            sharpe_ratio: 1.23456,
            annualized_sharpe_ratio: 0.5,
            max_drawdown: -0.25,
            max_drawdown_date: NaiveDate::from_ymd_opt(2020, 3, 23).unwrap(),
            longest_drawdown_days: 42,
        }
    }

    #[test]
    fn table_has_float_and_caption() {
        let table = render_summary_table(&[summary(0.003, 0.0)], DEFAULT_CAPTION);
        assert!(table.starts_with("\\begin{table}[p]\n\\centering\n"));
        assert!(table.contains("\\caption{Portfolio performance summary; daily rebalancing.}"));
        assert!(table.trim_end().ends_with("\\end{table}"));
    }

    #[test]
    fn percentages_and_ratios_are_formatted() {
        let table = render_summary_table(&[summary(0.003, 0.015)], "c");
        assert!(table.contains("Transaction Cost & 0.30\\% \\\\"));
        assert!(table.contains("Risk Free Rate & 1.50\\% \\\\"));
        assert!(table.contains("Total Return & 12.34\\% \\\\"));
        assert!(table.contains("Sharpe Ratio & 1.23 \\\\"));
        assert!(table.contains("Max Drawdown & -25.00\\% \\\\"));
        assert!(table.contains("Max Drawdown Date & 2020-03-23 \\\\"));
        assert!(table.contains("Longest Drawdown (Days) & 42 \\\\"));
    }

    #[test]
    fn one_column_per_run() {
        let table = render_summary_table(&[summary(0.003, 0.0), summary(0.0, 0.015)], "c");
        assert!(table.contains("\\begin{tabular}{lrr}"));
        assert!(table.contains("Transaction Cost & 0.30\\% & 0.00\\% \\\\"));
    }

    #[test]
    fn hline_separates_header_rows() {
        let table = render_summary_table(&[summary(0.0, 0.0)], "c");
        let lines: Vec<&str> = table.lines().collect();
        let rf = lines.iter().position(|l| l.starts_with("Risk Free Rate")).unwrap();
        assert_eq!(lines[rf + 1], "\\hline");
        assert!(lines[rf + 2].starts_with("Total Return"));
    }
}
