//! Backtest driver and NAV series.
//!
//! BacktestConfig defines the parameters of one run; [`ParameterGrid`]
//! expands transaction-cost and risk-free-rate lists into one config per
//! combination.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::error::BacktestError;
use super::ledger::{CashPolicy, PortfolioLedger, RebalanceOutcome};
use super::policy::AllocationPolicy;
use super::position::Positions;
use super::prices::WEIGHT_SUM_TOLERANCE;
use crate::ports::price_port::PriceSource;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub transaction_cost: f64,
    pub risk_free_rate: f64,
    pub cash_policy: CashPolicy,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100_000.0,
            transaction_cost: 0.0,
            risk_free_rate: 0.0,
            cash_policy: CashPolicy::default(),
            start_date: None,
            end_date: None,
        }
    }
}

impl BacktestConfig {
    /// Short identifier used in output file names, e.g. `ic100000_tc0.003_rf0`.
    pub fn label(&self) -> String {
        format!(
            "ic{}_tc{}_rf{}",
            self.initial_capital, self.transaction_cost, self.risk_free_rate
        )
    }
}

/// Transaction costs crossed with risk-free rates.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGrid {
    pub transaction_costs: Vec<f64>,
    pub risk_free_rates: Vec<f64>,
}

impl ParameterGrid {
    /// One config per `(transaction_cost, risk_free_rate)` pair, cost-major.
    pub fn expand(&self, base: &BacktestConfig) -> Vec<BacktestConfig> {
        let mut configs = Vec::with_capacity(self.transaction_costs.len() * self.risk_free_rates.len());
        for &transaction_cost in &self.transaction_costs {
            for &risk_free_rate in &self.risk_free_rates {
                configs.push(BacktestConfig {
                    transaction_cost,
                    risk_free_rate,
                    ..base.clone()
                });
            }
        }
        configs
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavPoint {
    pub date: NaiveDate,
    pub nav: f64,
}

/// Date-ascending NAV per backtest step. Append-only while the backtest runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavSeries {
    points: Vec<NavPoint>,
}

impl NavSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from points that must be strictly ascending by date.
    pub fn from_points(points: Vec<NavPoint>) -> Result<Self, BacktestError> {
        let mut series = NavSeries::new();
        for point in points {
            series.push(point.date, point.nav)?;
        }
        Ok(series)
    }

    pub(crate) fn push(&mut self, date: NaiveDate, nav: f64) -> Result<(), BacktestError> {
        if let Some(last) = self.points.last() {
            if date <= last.date {
                return Err(BacktestError::Data {
                    reason: format!("NAV for {date} is not after {}", last.date),
                });
            }
        }
        self.points.push(NavPoint { date, nav });
        Ok(())
    }

    pub fn points(&self) -> &[NavPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&NavPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&NavPoint> {
        self.points.last()
    }
}

/// Frozen output of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub config: BacktestConfig,
    pub policy_name: String,
    pub nav_series: NavSeries,
    pub outcomes: Vec<RebalanceOutcome>,
    pub final_cash: f64,
    pub final_positions: Positions,
}

/// Price dates inside the optional `[start, end]` bounds, ascending.
pub fn select_timestamps(
    source: &dyn PriceSource,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Vec<NaiveDate> {
    source
        .timestamps()
        .into_iter()
        .filter(|d| start_date.is_none_or(|s| *d >= s))
        .filter(|d| end_date.is_none_or(|e| *d <= e))
        .collect()
}

/// Run a backtest: at each timestamp ask the policy for weights, rebalance,
/// and record the pre-trade NAV.
///
/// The policy only ever sees the price row at the current timestamp. Until it
/// produces its first non-empty target the book is held and marked to market
/// instead, so the first real allocation is still the cost-free one. The
/// first error aborts the run.
pub fn run_backtest(
    source: &dyn PriceSource,
    policy: &mut dyn AllocationPolicy,
    timestamps: &[NaiveDate],
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    if let Some(pair) = timestamps.windows(2).find(|w| w[0] >= w[1]) {
        return Err(BacktestError::Data {
            reason: format!("timestamps not strictly ascending at {}", pair[1]),
        });
    }

    let mut ledger = PortfolioLedger::new(source, config.initial_capital, config.transaction_cost)
        .with_cash_policy(config.cash_policy);
    let mut nav_series = NavSeries::new();
    let mut outcomes = Vec::with_capacity(timestamps.len());

    info!(
        policy = policy.name(),
        steps = timestamps.len(),
        transaction_cost = config.transaction_cost,
        cash_policy = %config.cash_policy,
        "running backtest"
    );

    for &date in timestamps {
        let prices = source.row_at(date)?;
        let weights = policy.weights_for(date, prices);
        let nav = if weights.is_empty() {
            debug!(%date, "no target weights, holding");
            ledger.mark_to_market(date)?
        } else {
            let total: f64 = weights.values().sum();
            if total > 1.0 + WEIGHT_SUM_TOLERANCE {
                warn!(%date, total, "target weights exceed 1, position will be levered");
            }
            let outcome = ledger.rebalance(&weights, date)?;
            let nav = outcome.nav;
            outcomes.push(outcome);
            nav
        };
        nav_series.push(date, nav)?;
    }

    if let Some(last) = nav_series.last() {
        info!(date = %last.date, nav = last.nav, "backtest finished");
    }

    Ok(BacktestResult {
        config: config.clone(),
        policy_name: policy.name().to_string(),
        nav_series,
        outcomes,
        final_cash: ledger.cash(),
        final_positions: ledger.positions().clone(),
    })
}
