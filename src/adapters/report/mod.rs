//! Report writers for analysed backtests.
//!
//! - [`csv_report`]: per-run time series and summary CSV files
//! - [`latex_table`]: summary table combining every run of a grid
//! - [`chart_svg`]: NAV, underwater and rolling volatility charts

pub mod chart_svg;
pub mod csv_report;
pub mod latex_table;

use crate::domain::error::BacktestError;
use std::fs;
use std::path::{Path, PathBuf};

/// Write `content` to `output_dir/file_name`, creating the directory if needed.
pub(crate) fn write_file(
    output_dir: &Path,
    file_name: &str,
    content: &str,
) -> Result<PathBuf, BacktestError> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(file_name);
    fs::write(&path, content)?;
    Ok(path)
}

pub(crate) fn report_error(context: &str, err: impl std::fmt::Display) -> BacktestError {
    BacktestError::Report {
        reason: format!("{context}: {err}"),
    }
}
