//! Position sizing: target weights to whole-share trades.
//!
//! Pure function of its inputs. The ledger is the only caller that commits
//! the result.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::error::BacktestError;
use super::position::Positions;
use super::prices::{PriceRow, WeightVector};

/// Trades produced by one sizing pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SizedTrades {
    /// Signed share delta per weighted asset, including zero deltas.
    pub trades: BTreeMap<String, i64>,
    /// Sum over assets of the cost-adjusted value left over after rounding to whole shares.
    pub leftover_cash: f64,
}

impl SizedTrades {
    /// Cash needed to execute the trades at `prices` (negative for net sales).
    pub fn notional(&self, prices: &PriceRow) -> f64 {
        self.trades
            .iter()
            .map(|(asset, &qty)| qty as f64 * prices.get(asset).copied().unwrap_or(0.0))
            .sum()
    }

    /// Absolute value of all trades at `prices`.
    pub fn traded_value(&self, prices: &PriceRow) -> f64 {
        self.trades
            .iter()
            .map(|(asset, &qty)| (qty as f64 * prices.get(asset).copied().unwrap_or(0.0)).abs())
            .sum()
    }

    pub fn is_flat(&self) -> bool {
        self.trades.values().all(|&q| q == 0)
    }
}

/// Everything the sizer needs about the portfolio at one rebalance.
#[derive(Debug, Clone, Copy)]
pub struct SizingContext<'a> {
    pub date: NaiveDate,
    pub positions: &'a Positions,
    pub prices: &'a PriceRow,
    pub nav: f64,
    pub transaction_cost: f64,
    /// First allocation of the ledger: trades pay no transaction cost.
    pub is_initial: bool,
}

/// Convert target weights into whole-share trades.
///
/// For each weighted asset:
/// 1. target value = NAV * weight
/// 2. current value = held shares * price
/// 3. trade value = (target - current) * (1 - cost), or the target value itself
///    on the initial allocation
/// 4. shares = trade value / price, truncated toward zero
/// 5. the unspent remainder of the trade value is added to leftover cash
///
/// A missing or non-positive price for any weighted asset fails the whole
/// call with [`BacktestError::MissingPrice`].
pub fn size_positions(
    target_weights: &WeightVector,
    ctx: &SizingContext<'_>,
) -> Result<SizedTrades, BacktestError> {
    let mut sized = SizedTrades::default();

    for (asset, &weight) in target_weights {
        let price = match ctx.prices.get(asset) {
            Some(&p) if p > 0.0 => p,
            _ => {
                return Err(BacktestError::MissingPrice {
                    asset: asset.clone(),
                    date: ctx.date,
                });
            }
        };

        let target_value = ctx.nav * weight;
        let current_value = ctx.positions.get(asset) as f64 * price;

        let trade_value = if ctx.is_initial {
            target_value
        } else {
            (target_value - current_value) * (1.0 - ctx.transaction_cost)
        };

        let quantity = (trade_value / price).trunc() as i64;
        sized.leftover_cash += trade_value - quantity as f64 * price;
        sized.trades.insert(asset.clone(), quantity);
    }

    Ok(sized)
}
