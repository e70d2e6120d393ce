//! Portfolio ledger: cash, positions and NAV accounting.
//!
//! The ledger is mutated only by [`PortfolioLedger::rebalance`]. Each call
//! prices the book at the rebalance date, records that pre-trade NAV, sizes
//! trades against it and commits them. Every failure is raised before any
//! state changes, so a rebalance either applies completely or not at all.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::error::BacktestError;
use super::position::Positions;
use super::prices::{PriceRow, WeightVector};
use super::sizer::{SizingContext, size_positions};
use crate::ports::price_port::PriceSource;

/// How cash is updated after trades are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CashPolicy {
    /// Cash becomes the sizer's leftover, discarding the previous balance.
    ///
    /// Only value-preserving when the weights cover every held asset and sum
    /// to 1. Sale proceeds of an all-zero target are lost, and holdings left
    /// out of a sparse row are counted twice.
    Replace,
    /// Cash carries over, pays for the trades at the rebalance prices and
    /// pays `transaction_cost` on the traded value. Post-trade NAV equals the
    /// pre-trade NAV minus fees.
    #[default]
    Accumulate,
}

impl FromStr for CashPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(CashPolicy::Replace),
            "accumulate" => Ok(CashPolicy::Accumulate),
            other => Err(format!(
                "unknown cash policy '{other}' (expected replace or accumulate)"
            )),
        }
    }
}

impl fmt::Display for CashPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CashPolicy::Replace => write!(f, "replace"),
            CashPolicy::Accumulate => write!(f, "accumulate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerState {
    /// No rebalance has happened; the next one is the cost-free initial allocation.
    Uninitialized,
    Active,
}

/// What one rebalance did.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceOutcome {
    pub date: NaiveDate,
    /// NAV before the day's trades, the figure attributed to `date`.
    pub nav: f64,
    pub trades: BTreeMap<String, i64>,
    /// Leftover reported by the sizer.
    pub leftover_cash: f64,
    /// Fees charged to cash. Always 0 on the initial allocation and under
    /// [`CashPolicy::Replace`].
    pub fees: f64,
    /// Cash after the update.
    pub cash: f64,
}

pub struct PortfolioLedger<'a> {
    price_source: &'a dyn PriceSource,
    initial_capital: f64,
    transaction_cost: f64,
    cash_policy: CashPolicy,
    cash: f64,
    nav: f64,
    positions: Positions,
    previous_weights: WeightVector,
    state: LedgerState,
    rebalance_record: BTreeMap<NaiveDate, f64>,
}

impl fmt::Debug for PortfolioLedger<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortfolioLedger")
            .field("initial_capital", &self.initial_capital)
            .field("transaction_cost", &self.transaction_cost)
            .field("cash_policy", &self.cash_policy)
            .field("cash", &self.cash)
            .field("nav", &self.nav)
            .field("positions", &self.positions)
            .field("state", &self.state)
            .finish()
    }
}

impl<'a> PortfolioLedger<'a> {
    /// All capital starts as cash; `transaction_cost` is a fraction in `[0, 1)`.
    pub fn new(price_source: &'a dyn PriceSource, initial_capital: f64, transaction_cost: f64) -> Self {
        PortfolioLedger {
            price_source,
            initial_capital,
            transaction_cost,
            cash_policy: CashPolicy::default(),
            cash: initial_capital,
            nav: initial_capital,
            positions: Positions::new(),
            previous_weights: WeightVector::new(),
            state: LedgerState::Uninitialized,
            rebalance_record: BTreeMap::new(),
        }
    }

    pub fn with_cash_policy(mut self, cash_policy: CashPolicy) -> Self {
        self.cash_policy = cash_policy;
        self
    }

    /// Move the book toward `target_weights` using prices at exactly `date`.
    pub fn rebalance(
        &mut self,
        target_weights: &WeightVector,
        date: NaiveDate,
    ) -> Result<RebalanceOutcome, BacktestError> {
        let prices = self.price_source.row_at(date)?;
        let nav = self.cash + self.market_value_at(prices, date)?;

        let is_initial = self.state == LedgerState::Uninitialized;
        let sized = size_positions(
            target_weights,
            &SizingContext {
                date,
                positions: &self.positions,
                prices,
                nav,
                transaction_cost: self.transaction_cost,
                is_initial,
            },
        )?;

        // Nothing below can fail.
        let (cash, fees) = match self.cash_policy {
            CashPolicy::Replace => (sized.leftover_cash, 0.0),
            CashPolicy::Accumulate => {
                let fees = if is_initial {
                    0.0
                } else {
                    self.transaction_cost * sized.traded_value(prices)
                };
                (self.cash - sized.notional(prices) - fees, fees)
            }
        };
        for (asset, &delta) in &sized.trades {
            self.positions.apply(asset, delta);
        }
        self.cash = cash;
        self.nav = nav;
        self.previous_weights = target_weights.clone();
        self.state = LedgerState::Active;
        self.rebalance_record.insert(date, nav);

        debug!(
            %date,
            nav,
            cash,
            fees,
            trades = sized.trades.values().filter(|&&q| q != 0).count(),
            "rebalanced"
        );

        Ok(RebalanceOutcome {
            date,
            nav,
            trades: sized.trades,
            leftover_cash: sized.leftover_cash,
            fees,
            cash,
        })
    }

    fn market_value_at(&self, prices: &PriceRow, date: NaiveDate) -> Result<f64, BacktestError> {
        self.positions
            .market_value(prices)
            .map_err(|asset| BacktestError::MissingPrice { asset, date })
    }

    /// Cash plus positions valued at `date`, without rebalancing.
    pub fn mark_to_market(&self, date: NaiveDate) -> Result<f64, BacktestError> {
        let prices = self.price_source.row_at(date)?;
        Ok(self.cash + self.market_value_at(prices, date)?)
    }

    /// NAV as of the last rebalance (pre-trade).
    ///
    /// Days on which the driver only marks the book to market do not move
    /// this figure; use [`PortfolioLedger::mark_to_market`] for the value at
    /// an arbitrary date.
    pub fn nav(&self) -> f64 {
        self.nav
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn positions(&self) -> &Positions {
        &self.positions
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn transaction_cost(&self) -> f64 {
        self.transaction_cost
    }

    pub fn cash_policy(&self) -> CashPolicy {
        self.cash_policy
    }

    pub fn state(&self) -> LedgerState {
        self.state
    }

    pub fn previous_weights(&self) -> &WeightVector {
        &self.previous_weights
    }

    /// Pre-trade NAV per rebalance date.
    pub fn rebalance_record(&self) -> &BTreeMap<NaiveDate, f64> {
        &self.rebalance_record
    }
}
