//! Performance statistics over a NAV series.
//!
//! [`compute_stats`] is a pure function of the series: it builds the full
//! per-date frame (returns, broadcast volatility and Sharpe, drawdowns,
//! rolling volatility) and the one-row summary. [`BacktestAnalysis`] wraps a
//! finished run and refuses to hand out results before they are computed.

use chrono::NaiveDate;

use super::backtest::{BacktestResult, NavSeries};
use super::error::BacktestError;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const ROLLING_VOLATILITY_WINDOW: usize = 21;

/// One row of the intermediate frame.
///
/// `volatility` and `sharpe_ratio` are whole-series aggregates repeated on
/// every row.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsFrameRow {
    pub date: NaiveDate,
    pub nav: f64,
    pub daily_return: f64,
    pub cumulative_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub drawdown: f64,
    pub max_drawdown: f64,
    /// Annualised 21-day rolling volatility; `None` until the window fills.
    pub rolling_volatility: Option<f64>,
}

/// Exported per-date statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRecord {
    pub date: NaiveDate,
    pub nav: f64,
    pub daily_return: f64,
    pub cumulative_return: f64,
}

/// Per-date series used by the charts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosticRecord {
    pub date: NaiveDate,
    pub nav: f64,
    pub drawdown: f64,
    pub max_drawdown: f64,
    pub rolling_volatility: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub transaction_cost: f64,
    pub risk_free_rate: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub annualized_sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_date: NaiveDate,
    pub longest_drawdown_days: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsOutput {
    pub frame: Vec<StatsFrameRow>,
    pub summary: SummaryRecord,
}

impl StatsOutput {
    /// The frame without the intermediate columns.
    pub fn records(&self) -> Vec<StatsRecord> {
        self.frame
            .iter()
            .map(|row| StatsRecord {
                date: row.date,
                nav: row.nav,
                daily_return: row.daily_return,
                cumulative_return: row.cumulative_return,
            })
            .collect()
    }

    pub fn diagnostics(&self) -> Vec<DiagnosticRecord> {
        self.frame
            .iter()
            .map(|row| DiagnosticRecord {
                date: row.date,
                nav: row.nav,
                drawdown: row.drawdown,
                max_drawdown: row.max_drawdown,
                rolling_volatility: row.rolling_volatility,
            })
            .collect()
    }
}

/// r[0] = 0, r[i] = nav[i] / nav[i-1] - 1. A zero previous NAV yields 0.
pub fn daily_returns(navs: &[f64]) -> Vec<f64> {
    let mut returns = Vec::with_capacity(navs.len());
    if navs.is_empty() {
        return returns;
    }
    returns.push(0.0);
    returns.extend(navs.windows(2).map(|w| {
        if w[0] != 0.0 {
            w[1] / w[0] - 1.0
        } else {
            0.0
        }
    }));
    returns
}

/// C[i] = prod(1 + r[0..=i]) - 1.
pub fn cumulative_returns(returns: &[f64]) -> Vec<f64> {
    let mut growth = 1.0;
    returns
        .iter()
        .map(|r| {
            growth *= 1.0 + r;
            growth - 1.0
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator); 0 for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// drawdown[i] = nav[i] / max(nav[0..=i]) - 1. Zero while the peak is not positive.
pub fn drawdowns(navs: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    navs.iter()
        .map(|&nav| {
            peak = peak.max(nav);
            if peak > 0.0 { nav / peak - 1.0 } else { 0.0 }
        })
        .collect()
}

/// maxdd[i] = min(drawdown[0..=i]).
pub fn running_max_drawdown(drawdowns: &[f64]) -> Vec<f64> {
    let mut worst = 0.0_f64;
    drawdowns
        .iter()
        .map(|&dd| {
            worst = worst.min(dd);
            worst
        })
        .collect()
}

/// Annualised rolling sample standard deviation of `returns`.
pub fn rolling_volatility(returns: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..returns.len())
        .map(|i| {
            if window < 2 || i + 1 < window {
                None
            } else {
                let slice = &returns[i + 1 - window..=i];
                Some(sample_std(slice) * TRADING_DAYS_PER_YEAR.sqrt())
            }
        })
        .collect()
}

/// Longest gap in calendar days between consecutive new NAV peaks.
///
/// Dates where the drawdown is exactly zero are recovery points. If the
/// series ends below its peak, the gap from the last recovery point to the
/// final date counts as an episode too.
pub fn longest_drawdown_days(dates: &[NaiveDate], drawdowns: &[f64]) -> i64 {
    let mut recoveries: Vec<NaiveDate> = dates
        .iter()
        .zip(drawdowns)
        .filter(|&(_, &dd)| dd == 0.0)
        .map(|(&d, _)| d)
        .collect();

    if let (Some(&last_date), Some(&last_dd)) = (dates.last(), drawdowns.last()) {
        if last_dd != 0.0 {
            recoveries.push(last_date);
        }
    }

    recoveries
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .max()
        .unwrap_or(0)
}

fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v < values[best] {
            best = i;
        }
    }
    best
}

/// Compute the frame and summary for a NAV series.
///
/// With `m = n - 1` non-neutral returns:
/// - volatility = sample std of r[1..]; annualised by sqrt(252 / m)
/// - Sharpe = m * mean(r[1..] - rf / 252) / volatility; annualised by sqrt(252 / m)
/// - annualised return = (1 + total) ^ (252 / n) - 1
///
/// Zero volatility gives a Sharpe of 0.
pub fn compute_stats(
    series: &NavSeries,
    risk_free_rate: f64,
    transaction_cost: f64,
) -> Result<StatsOutput, BacktestError> {
    let (first, last) = match (series.first(), series.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(BacktestError::NotRun {
                what: "statistics over an empty NAV series".into(),
            });
        }
    };

    let dates: Vec<NaiveDate> = series.points().iter().map(|p| p.date).collect();
    let navs: Vec<f64> = series.points().iter().map(|p| p.nav).collect();
    let n = navs.len();
    let m = n - 1;

    let returns = daily_returns(&navs);
    let cumulative = cumulative_returns(&returns);

    let active = &returns[1..];
    let volatility = sample_std(active);
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = active.iter().map(|r| r - daily_rf).collect();
    let sharpe_ratio = if volatility > 0.0 {
        m as f64 * mean(&excess) / volatility
    } else {
        0.0
    };
    let annualizer = if m > 0 {
        (TRADING_DAYS_PER_YEAR / m as f64).sqrt()
    } else {
        0.0
    };

    let dd = drawdowns(&navs);
    let max_dd = running_max_drawdown(&dd);
    let rolling = rolling_volatility(&returns, ROLLING_VOLATILITY_WINDOW);

    let total_return = if first.nav != 0.0 {
        last.nav / first.nav - 1.0
    } else {
        0.0
    };
    let growth = 1.0 + total_return;
    let annualized_return = if growth > 0.0 {
        growth.powf(TRADING_DAYS_PER_YEAR / n as f64) - 1.0
    } else {
        -1.0
    };

    let worst = argmin(&dd);
    let summary = SummaryRecord {
        transaction_cost,
        risk_free_rate,
        total_return,
        annualized_return,
        annualized_volatility: volatility * annualizer,
        sharpe_ratio,
        annualized_sharpe_ratio: sharpe_ratio * annualizer,
        max_drawdown: dd[worst],
        max_drawdown_date: dates[worst],
        longest_drawdown_days: longest_drawdown_days(&dates, &dd),
    };

    let frame = (0..n)
        .map(|i| StatsFrameRow {
            date: dates[i],
            nav: navs[i],
            daily_return: returns[i],
            cumulative_return: cumulative[i],
            volatility,
            sharpe_ratio,
            drawdown: dd[i],
            max_drawdown: max_dd[i],
            rolling_volatility: rolling[i],
        })
        .collect();

    Ok(StatsOutput { frame, summary })
}

/// A finished backtest plus the statistics computed from it.
#[derive(Debug, Clone)]
pub struct BacktestAnalysis {
    result: BacktestResult,
    risk_free_rate: f64,
    output: Option<StatsOutput>,
}

impl BacktestAnalysis {
    /// Uses the run's configured risk-free rate.
    pub fn new(result: BacktestResult) -> Self {
        let risk_free_rate = result.config.risk_free_rate;
        BacktestAnalysis {
            result,
            risk_free_rate,
            output: None,
        }
    }

    pub fn with_risk_free_rate(mut self, risk_free_rate: f64) -> Self {
        self.risk_free_rate = risk_free_rate;
        self.output = None;
        self
    }

    /// Compute (or recompute) statistics from the frozen NAV series.
    pub fn compute_stats(&mut self) -> Result<&StatsOutput, BacktestError> {
        let output = compute_stats(
            &self.result.nav_series,
            self.risk_free_rate,
            self.result.config.transaction_cost,
        )?;
        Ok(&*self.output.insert(output))
    }

    pub fn is_computed(&self) -> bool {
        self.output.is_some()
    }

    pub fn result(&self) -> &BacktestResult {
        &self.result
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    /// Output file label for this run.
    pub fn label(&self) -> String {
        let mut config = self.result.config.clone();
        config.risk_free_rate = self.risk_free_rate;
        config.label()
    }

    pub fn output(&self) -> Result<&StatsOutput, BacktestError> {
        self.output.as_ref().ok_or_else(|| BacktestError::NotRun {
            what: "statistics".into(),
        })
    }

    pub fn stats(&self) -> Result<Vec<StatsRecord>, BacktestError> {
        Ok(self.output()?.records())
    }

    pub fn diagnostics(&self) -> Result<Vec<DiagnosticRecord>, BacktestError> {
        Ok(self.output()?.diagnostics())
    }

    pub fn frame(&self) -> Result<&[StatsFrameRow], BacktestError> {
        Ok(&self.output()?.frame)
    }

    pub fn summary(&self) -> Result<&SummaryRecord, BacktestError> {
        self.output
            .as_ref()
            .map(|o| &o.summary)
            .ok_or_else(|| BacktestError::NotRun {
                what: "summary".into(),
            })
    }
}
