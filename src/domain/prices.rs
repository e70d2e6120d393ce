//! Price and weight tables keyed by date.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::error::BacktestError;
use crate::ports::price_port::PriceSource;

/// Close price per asset at one date.
pub type PriceRow = BTreeMap<String, f64>;

/// Target weight per asset at one date. Need not sum to 1; cash takes the rest.
pub type WeightVector = BTreeMap<String, f64>;

/// Tolerance used when checking that a weight row sums to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

pub fn weight_sum(weights: &WeightVector) -> f64 {
    weights.values().sum()
}

/// In-memory price grid, the default [`PriceSource`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    rows: BTreeMap<NaiveDate, PriceRow>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_row(&mut self, date: NaiveDate, row: PriceRow) {
        self.rows.insert(date, row);
    }

    pub fn with_row(mut self, date: NaiveDate, row: PriceRow) -> Self {
        self.insert_row(date, row);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sorted, de-duplicated set of assets that appear in any row.
    pub fn assets(&self) -> Vec<String> {
        let mut assets: Vec<String> = self
            .rows
            .values()
            .flat_map(|row| row.keys().cloned())
            .collect();
        assets.sort();
        assets.dedup();
        assets
    }

    /// Reject any non-positive or non-finite price.
    pub fn validate(&self) -> Result<(), BacktestError> {
        for (date, row) in &self.rows {
            for (asset, &price) in row {
                if !(price.is_finite() && price > 0.0) {
                    return Err(BacktestError::InvalidPrice {
                        asset: asset.clone(),
                        date: *date,
                        price,
                    });
                }
            }
        }
        Ok(())
    }
}

impl PriceSource for PriceTable {
    fn row_at(&self, date: NaiveDate) -> Result<&PriceRow, BacktestError> {
        self.rows
            .get(&date)
            .ok_or(BacktestError::MissingTimestamp { date })
    }

    fn timestamps(&self) -> Vec<NaiveDate> {
        self.rows.keys().copied().collect()
    }
}

/// Dated schedule of target weights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightTable {
    rows: BTreeMap<NaiveDate, WeightVector>,
}

impl WeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_row(&mut self, date: NaiveDate, weights: WeightVector) {
        self.rows.insert(date, weights);
    }

    pub fn with_row(mut self, date: NaiveDate, weights: WeightVector) -> Self {
        self.insert_row(date, weights);
        self
    }

    pub fn row_at(&self, date: NaiveDate) -> Option<&WeightVector> {
        self.rows.get(&date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.rows.contains_key(&date)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every row must sum to one within [`WEIGHT_SUM_TOLERANCE`].
    pub fn validate(&self) -> Result<(), BacktestError> {
        for (date, weights) in &self.rows {
            let sum = weight_sum(weights);
            if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(BacktestError::InvalidWeights { date: *date, sum });
            }
        }
        Ok(())
    }
}

/// Build a row from `(asset, value)` pairs.
pub fn row<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> BTreeMap<String, f64> {
    pairs
        .into_iter()
        .map(|(asset, value)| (asset.to_string(), value))
        .collect()
}
