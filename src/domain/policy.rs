//! Allocation policies: map a date to target weights.

use chrono::{Months, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use super::prices::{PriceRow, WeightTable, WeightVector};

/// Source of target weights for the backtest driver.
///
/// `prices` is the row at `date` and nothing later; a policy that needs
/// history keeps its own record of the rows it has been shown.
pub trait AllocationPolicy {
    fn name(&self) -> &str;

    fn weights_for(&mut self, date: NaiveDate, prices: &PriceRow) -> WeightVector;
}

/// Follows a dated weight schedule, holding the last row between schedule dates.
#[derive(Debug, Clone)]
pub struct FixedSchedulePolicy {
    schedule: WeightTable,
    current: WeightVector,
}

impl FixedSchedulePolicy {
    pub fn new(schedule: WeightTable) -> Self {
        FixedSchedulePolicy {
            schedule,
            current: WeightVector::new(),
        }
    }

    pub fn current_weights(&self) -> &WeightVector {
        &self.current
    }
}

impl AllocationPolicy for FixedSchedulePolicy {
    fn name(&self) -> &str {
        "fixed"
    }

    fn weights_for(&mut self, date: NaiveDate, _prices: &PriceRow) -> WeightVector {
        if let Some(row) = self.schedule.row_at(date) {
            self.current = row.clone();
        }
        self.current.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MomentumParams {
    /// Start of the ranking window, in months before the re-weighting date.
    pub lookback_months: u32,
    /// End of the ranking window, in months before the re-weighting date.
    pub skip_months: u32,
    /// Number of initial re-weighting dates that take the scheduled weights.
    pub warmup_rebalances: usize,
}

impl Default for MomentumParams {
    fn default() -> Self {
        MomentumParams {
            lookback_months: 2,
            skip_months: 1,
            warmup_rebalances: 2,
        }
    }
}

/// Single-winner momentum.
///
/// On each date of the re-weighting calendar, rank assets by mean daily
/// return over `[t - lookback, t - skip - 1 day]` and go fully long the best
/// one, or to cash if even the best mean is not positive. Assets that are not
/// held get an explicit zero weight. The first `warmup_rebalances` calendar
/// dates use the calendar's own weights. Equal means go to the asset whose
/// name sorts first, not to the first price column.
#[derive(Debug, Clone)]
pub struct MomentumPolicy {
    calendar: WeightTable,
    params: MomentumParams,
    history: BTreeMap<NaiveDate, PriceRow>,
    universe: BTreeSet<String>,
    current: WeightVector,
    reweights: usize,
}

impl MomentumPolicy {
    pub fn new(calendar: WeightTable, params: MomentumParams) -> Self {
        MomentumPolicy {
            calendar,
            params,
            history: BTreeMap::new(),
            universe: BTreeSet::new(),
            current: WeightVector::new(),
            reweights: 0,
        }
    }

    pub fn params(&self) -> MomentumParams {
        self.params
    }

    fn window(&self, date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let start = date.checked_sub_months(Months::new(self.params.lookback_months))?;
        let end = date
            .checked_sub_months(Months::new(self.params.skip_months))?
            .pred_opt()?;
        Some((start, end))
    }

    /// Mean daily simple return per asset over the recorded rows in `[start, end]`.
    fn mean_returns(&self, start: NaiveDate, end: NaiveDate) -> BTreeMap<String, f64> {
        let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        let mut previous: Option<&PriceRow> = None;

        for row in self.history.range(start..=end).map(|(_, row)| row) {
            if let Some(prev) = previous {
                for (asset, &price) in row {
                    if let Some(&before) = prev.get(asset) {
                        let entry = sums.entry(asset.clone()).or_insert((0.0, 0));
                        entry.0 += price / before - 1.0;
                        entry.1 += 1;
                    }
                }
            }
            previous = Some(row);
        }

        sums.into_iter()
            .map(|(asset, (sum, count))| (asset, sum / count as f64))
            .collect()
    }

    fn rank(&self, date: NaiveDate) -> Option<WeightVector> {
        let (start, end) = self.window(date)?;
        let means = self.mean_returns(start, end);

        // First maximum wins ties, in name order.
        let mut winner: Option<(&String, f64)> = None;
        for (asset, &mean) in &means {
            if winner.is_none_or(|(_, best)| mean > best) {
                winner = Some((asset, mean));
            }
        }
        let (winner, best) = winner?;

        let mut weights: WeightVector = self.universe.iter().map(|a| (a.clone(), 0.0)).collect();
        if best > 0.0 {
            weights.insert(winner.clone(), 1.0);
        }
        Some(weights)
    }
}

impl AllocationPolicy for MomentumPolicy {
    fn name(&self) -> &str {
        "momentum"
    }

    fn weights_for(&mut self, date: NaiveDate, prices: &PriceRow) -> WeightVector {
        self.history.insert(date, prices.clone());
        self.universe.extend(prices.keys().cloned());

        if let Some(scheduled) = self.calendar.row_at(date) {
            self.universe.extend(scheduled.keys().cloned());
            if self.reweights < self.params.warmup_rebalances {
                self.current = scheduled.clone();
            } else {
                match self.rank(date) {
                    Some(weights) => self.current = weights,
                    None => warn!(%date, "momentum window has no returns, keeping weights"),
                }
            }
            self.reweights += 1;
        }

        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prices::row;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn example_schedule() -> WeightTable {
        let weights = row([("asset1", 0.5), ("asset2", 0.3), ("asset3", 0.2)]);
        WeightTable::new()
            .with_row(date(2020, 1, 1), weights.clone())
            .with_row(date(2020, 1, 2), weights.clone())
            .with_row(date(2020, 1, 3), weights)
    }

    #[test]
    fn fixed_policy_starts_empty() {
        let policy = FixedSchedulePolicy::new(example_schedule());
        assert!(policy.current_weights().is_empty());
        assert_eq!(policy.name(), "fixed");
    }

    #[test]
    fn fixed_policy_returns_scheduled_row() {
        let mut policy = FixedSchedulePolicy::new(example_schedule());
        let weights = policy.weights_for(date(2020, 1, 1), &PriceRow::new());
        assert_eq!(weights, row([("asset1", 0.5), ("asset2", 0.3), ("asset3", 0.2)]));
    }

    #[test]
    fn fixed_policy_holds_between_schedule_dates() {
        let schedule = WeightTable::new()
            .with_row(date(2020, 1, 1), row([("asset1", 1.0)]))
            .with_row(date(2020, 2, 1), row([("asset2", 1.0)]));
        let mut policy = FixedSchedulePolicy::new(schedule);

        assert!(policy.weights_for(date(2019, 12, 31), &PriceRow::new()).is_empty());
        policy.weights_for(date(2020, 1, 1), &PriceRow::new());
        let held = policy.weights_for(date(2020, 1, 15), &PriceRow::new());
        assert_eq!(held, row([("asset1", 1.0)]));
        let next = policy.weights_for(date(2020, 2, 1), &PriceRow::new());
        assert_eq!(next, row([("asset2", 1.0)]));
    }

    fn month_starts() -> WeightTable {
        let defaults = row([("up", 0.5), ("down", 0.5)]);
        WeightTable::new()
            .with_row(date(2020, 1, 1), defaults.clone())
            .with_row(date(2020, 2, 1), defaults.clone())
            .with_row(date(2020, 3, 1), defaults.clone())
            .with_row(date(2020, 4, 1), defaults)
    }

    /// Feed daily rows from Jan 1 through `last`; `up` rises 1% a day while
    /// `down` falls 1% a day.
    fn feed(policy: &mut MomentumPolicy, last: NaiveDate) -> WeightVector {
        let mut day = date(2020, 1, 1);
        let mut up = 100.0;
        let mut down = 100.0;
        let mut weights = WeightVector::new();
        while day <= last {
            weights = policy.weights_for(day, &row([("up", up), ("down", down)]));
            up *= 1.01;
            down *= 0.99;
            day = day.succ_opt().unwrap();
        }
        weights
    }

    #[test]
    fn momentum_uses_schedule_during_warmup() {
        let mut policy = MomentumPolicy::new(month_starts(), MomentumParams::default());
        let weights = feed(&mut policy, date(2020, 2, 15));
        assert_eq!(weights, row([("up", 0.5), ("down", 0.5)]));
    }

    #[test]
    fn momentum_picks_winner_after_warmup() {
        let mut policy = MomentumPolicy::new(month_starts(), MomentumParams::default());
        let weights = feed(&mut policy, date(2020, 3, 1));
        assert_eq!(weights, row([("up", 1.0), ("down", 0.0)]));
    }

    #[test]
    fn momentum_goes_to_cash_when_everything_falls() {
        let calendar = month_starts();
        let mut policy = MomentumPolicy::new(calendar, MomentumParams::default());
        let mut day = date(2020, 1, 1);
        let mut a = 100.0;
        let mut b = 50.0;
        let mut weights = WeightVector::new();
        while day <= date(2020, 3, 1) {
            weights = policy.weights_for(day, &row([("a", a), ("b", b)]));
            a *= 0.99;
            b *= 0.98;
            day = day.succ_opt().unwrap();
        }
        assert!(weights.values().all(|&w| w == 0.0));
        assert!(weights.contains_key("a"));
        assert!(weights.contains_key("b"));
    }

    #[test]
    fn momentum_ties_go_to_the_first_name() {
        let mut policy = MomentumPolicy::new(month_starts(), MomentumParams::default());
        let mut day = date(2020, 1, 1);
        let mut price = 100.0;
        let mut weights = WeightVector::new();
        while day <= date(2020, 3, 1) {
            weights = policy.weights_for(day, &row([("zeta", price), ("alpha", price)]));
            price *= 1.01;
            day = day.succ_opt().unwrap();
        }
        assert_eq!(weights["alpha"], 1.0);
        assert_eq!(weights["zeta"], 0.0);
    }

    #[test]
    fn momentum_window_excludes_the_skip_month() {
        let policy = MomentumPolicy::new(month_starts(), MomentumParams::default());
        let (start, end) = policy.window(date(2020, 8, 1)).unwrap();
        assert_eq!(start, date(2020, 6, 1));
        assert_eq!(end, date(2020, 6, 30));
    }

    #[test]
    fn momentum_keeps_weights_when_window_is_empty() {
        let calendar = WeightTable::new()
            .with_row(date(2020, 1, 1), row([("x", 1.0)]))
            .with_row(date(2020, 1, 2), row([("x", 1.0)]))
            .with_row(date(2020, 1, 3), row([("x", 1.0)]));
        let mut policy = MomentumPolicy::new(calendar, MomentumParams::default());
        policy.weights_for(date(2020, 1, 1), &row([("x", 1.0)]));
        policy.weights_for(date(2020, 1, 2), &row([("x", 1.1)]));
        let weights = policy.weights_for(date(2020, 1, 3), &row([("x", 1.2)]));
        assert_eq!(weights, row([("x", 1.0)]));
    }

    #[test]
    fn momentum_never_sees_future_rows() {
        let mut policy = MomentumPolicy::new(month_starts(), MomentumParams::default());
        feed(&mut policy, date(2020, 1, 10));
        assert_eq!(policy.history.keys().last(), Some(&date(2020, 1, 10)));
    }
}
