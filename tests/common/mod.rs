#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::Write;
use stratbt::domain::backtest::{NavPoint, NavSeries};
use stratbt::domain::error::BacktestError;
use stratbt::domain::prices::{PriceRow, PriceTable, WeightTable, WeightVector, row};
use stratbt::ports::data_port::DataPort;
use stratbt::ports::price_port::PriceSource;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn day(offset: i64) -> NaiveDate {
    date(2020, 1, 1) + chrono::Duration::days(offset)
}

/// Price source backed by a hash map, with an optional set of dates that
/// report as missing even when a row exists.
pub struct MockPriceSource {
    pub rows: HashMap<NaiveDate, PriceRow>,
    pub hidden: Vec<NaiveDate>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self {
            rows: HashMap::new(),
            hidden: Vec::new(),
        }
    }

    pub fn with_row(mut self, date: NaiveDate, prices: PriceRow) -> Self {
        self.rows.insert(date, prices);
        self
    }

    pub fn hiding(mut self, date: NaiveDate) -> Self {
        self.hidden.push(date);
        self
    }
}

impl PriceSource for MockPriceSource {
    fn row_at(&self, date: NaiveDate) -> Result<&PriceRow, BacktestError> {
        if self.hidden.contains(&date) {
            return Err(BacktestError::MissingTimestamp { date });
        }
        self.rows
            .get(&date)
            .ok_or(BacktestError::MissingTimestamp { date })
    }

    fn timestamps(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.rows.keys().copied().collect();
        dates.sort();
        dates
    }
}

/// In-memory data port; `None` makes the corresponding load fail.
pub struct MockDataPort {
    pub prices: Option<PriceTable>,
    pub weights: Option<WeightTable>,
}

impl MockDataPort {
    pub fn new(prices: PriceTable, weights: WeightTable) -> Self {
        Self {
            prices: Some(prices),
            weights: Some(weights),
        }
    }
}

impl DataPort for MockDataPort {
    fn load_prices(&self) -> Result<PriceTable, BacktestError> {
        self.prices.clone().ok_or_else(|| BacktestError::Data {
            reason: "mock prices unavailable".into(),
        })
    }

    fn load_weights(&self) -> Result<WeightTable, BacktestError> {
        self.weights.clone().ok_or_else(|| BacktestError::Data {
            reason: "mock weights unavailable".into(),
        })
    }
}

/// Three assets over three days.
pub fn reference_prices() -> PriceTable {
    PriceTable::new()
        .with_row(day(0), row([("asset1", 1.0), ("asset2", 4.0), ("asset3", 7.0)]))
        .with_row(day(1), row([("asset1", 2.0), ("asset2", 5.0), ("asset3", 8.0)]))
        .with_row(day(2), row([("asset1", 3.0), ("asset2", 6.0), ("asset3", 9.0)]))
}

pub fn reference_weights() -> WeightVector {
    row([("asset1", 0.5), ("asset2", 0.3), ("asset3", 0.2)])
}

/// The reference weights on every reference date.
pub fn reference_schedule() -> WeightTable {
    WeightTable::new()
        .with_row(day(0), reference_weights())
        .with_row(day(1), reference_weights())
        .with_row(day(2), reference_weights())
}

/// Daily NAV series starting on 2020-01-01.
pub fn nav_series(values: &[f64]) -> NavSeries {
    NavSeries::from_points(
        values
            .iter()
            .enumerate()
            .map(|(i, &nav)| NavPoint {
                date: day(i as i64),
                nav,
            })
            .collect(),
    )
    .unwrap()
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
