//! Report generation port trait.

use crate::domain::error::BacktestError;
use crate::domain::stats::BacktestAnalysis;
use std::path::{Path, PathBuf};

/// Port for rendering analysed backtests.
///
/// Writers only ever see read-only snapshots; an analysis that has not been
/// computed yet surfaces as [`BacktestError::NotRun`].
pub trait ReportPort {
    /// Write the outputs for one run into `output_dir`, returning the files written.
    fn write(
        &self,
        analysis: &BacktestAnalysis,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, BacktestError>;

    /// Default implementation: writes each run independently.
    fn write_all(
        &self,
        analyses: &[BacktestAnalysis],
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, BacktestError> {
        let mut written = Vec::new();
        for analysis in analyses {
            written.extend(self.write(analysis, output_dir)?);
        }
        Ok(written)
    }
}
