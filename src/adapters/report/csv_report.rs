//! CSV report writer.
//!
//! Per run: `timeseries_{label}.csv` with one row per date and
//! `summary_{label}.csv` with a single summary row. Summary files can be read
//! back with [`read_summary`] to rebuild tables without re-running.

use super::report_error;
use crate::domain::config_validation::DEFAULT_DATE_FORMAT;
use crate::domain::error::BacktestError;
use crate::domain::stats::{BacktestAnalysis, SummaryRecord};
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const TIMESERIES_HEADERS: [&str; 4] = ["date", "nav", "return", "cumulative_return"];

pub const SUMMARY_HEADERS: [&str; 10] = [
    "Transaction Cost",
    "Risk Free Rate",
    "Total Return",
    "Return (Ann.)",
    "Volatility (Ann.)",
    "Sharpe Ratio",
    "Sharpe Ratio (Ann.)",
    "Max Drawdown",
    "Max Drawdown Date",
    "Longest Drawdown (Days)",
];

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }
}

fn summary_fields(summary: &SummaryRecord) -> Vec<String> {
    vec![
        summary.transaction_cost.to_string(),
        summary.risk_free_rate.to_string(),
        summary.total_return.to_string(),
        summary.annualized_return.to_string(),
        summary.annualized_volatility.to_string(),
        summary.sharpe_ratio.to_string(),
        summary.annualized_sharpe_ratio.to_string(),
        summary.max_drawdown.to_string(),
        summary.max_drawdown_date.format(DEFAULT_DATE_FORMAT).to_string(),
        summary.longest_drawdown_days.to_string(),
    ]
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        analysis: &BacktestAnalysis,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, BacktestError> {
        let records = analysis.stats()?;
        let summary = analysis.summary()?;
        let label = analysis.label();
        fs::create_dir_all(output_dir)?;

        let timeseries_path = output_dir.join(format!("timeseries_{label}.csv"));
        let mut wtr = csv::Writer::from_path(&timeseries_path)
            .map_err(|e| report_error("timeseries csv", e))?;
        wtr.write_record(TIMESERIES_HEADERS)
            .map_err(|e| report_error("timeseries csv", e))?;
        for record in &records {
            wtr.write_record([
                record.date.format(DEFAULT_DATE_FORMAT).to_string(),
                record.nav.to_string(),
                record.daily_return.to_string(),
                record.cumulative_return.to_string(),
            ])
            .map_err(|e| report_error("timeseries csv", e))?;
        }
        wtr.flush()?;

        let summary_path = output_dir.join(format!("summary_{label}.csv"));
        let mut wtr =
            csv::Writer::from_path(&summary_path).map_err(|e| report_error("summary csv", e))?;
        wtr.write_record(SUMMARY_HEADERS)
            .map_err(|e| report_error("summary csv", e))?;
        wtr.write_record(summary_fields(summary))
            .map_err(|e| report_error("summary csv", e))?;
        wtr.flush()?;

        info!(%label, path = %summary_path.display(), "wrote csv report");
        Ok(vec![timeseries_path, summary_path])
    }
}

fn parse_number(path: &Path, column: &str, value: &str) -> Result<f64, BacktestError> {
    value.trim().parse().map_err(|_| BacktestError::Data {
        reason: format!("{}: invalid {column} '{value}'", path.display()),
    })
}

fn column_value<'r>(
    path: &Path,
    headers: &csv::StringRecord,
    record: &'r csv::StringRecord,
    column: &str,
) -> Result<&'r str, BacktestError> {
    headers
        .iter()
        .position(|h| h == column)
        .and_then(|i| record.get(i))
        .ok_or_else(|| BacktestError::Data {
            reason: format!("{}: missing column '{column}'", path.display()),
        })
}

/// Read the first summary row of a file written by [`CsvReportAdapter`].
pub fn read_summary(path: &Path) -> Result<SummaryRecord, BacktestError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| BacktestError::Data {
        reason: format!("{}: {e}", path.display()),
    })?;

    let headers = rdr
        .headers()
        .map_err(|e| BacktestError::Data {
            reason: format!("{}: {e}", path.display()),
        })?
        .clone();
    let record = rdr
        .records()
        .next()
        .ok_or_else(|| BacktestError::Data {
            reason: format!("{}: no summary row", path.display()),
        })?
        .map_err(|e| BacktestError::Data {
            reason: format!("{}: {e}", path.display()),
        })?;

    let field = |column: &str| column_value(path, &headers, &record, column);
    let number = |column: &str| parse_number(path, column, field(column)?);

    let date_str = field("Max Drawdown Date")?;
    let max_drawdown_date = NaiveDate::parse_from_str(date_str.trim(), DEFAULT_DATE_FORMAT)
        .map_err(|_| BacktestError::Data {
            reason: format!("{}: invalid Max Drawdown Date '{date_str}'", path.display()),
        })?;
    let days_str = field("Longest Drawdown (Days)")?;
    let longest_drawdown_days = days_str.trim().parse().map_err(|_| BacktestError::Data {
        reason: format!(
            "{}: invalid Longest Drawdown (Days) '{days_str}'",
            path.display()
        ),
    })?;

    Ok(SummaryRecord {
        transaction_cost: number("Transaction Cost")?,
        risk_free_rate: number("Risk Free Rate")?,
        total_return: number("Total Return")?,
        annualized_return: number("Return (Ann.)")?,
        annualized_volatility: number("Volatility (Ann.)")?,
        sharpe_ratio: number("Sharpe Ratio")?,
        annualized_sharpe_ratio: number("Sharpe Ratio (Ann.)")?,
        max_drawdown: number("Max Drawdown")?,
        max_drawdown_date,
        longest_drawdown_days,
    })
}
