//! CSV file data adapter.
//!
//! Prices and weights share one layout: a `date` column followed by one
//! column per asset. Empty cells are skipped.

use crate::domain::config_validation::DEFAULT_DATE_FORMAT;
use crate::domain::error::BacktestError;
use crate::domain::prices::{PriceTable, WeightTable};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct CsvDataAdapter {
    prices_path: PathBuf,
    weights_path: PathBuf,
    date_format: String,
}

impl CsvDataAdapter {
    pub fn new(prices_path: PathBuf, weights_path: PathBuf) -> Self {
        Self {
            prices_path,
            weights_path,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = date_format.into();
        self
    }
}

type DatedRows = BTreeMap<NaiveDate, BTreeMap<String, f64>>;

fn data_error(path: &Path, reason: impl std::fmt::Display) -> BacktestError {
    BacktestError::Data {
        reason: format!("{}: {}", path.display(), reason),
    }
}

/// Parse a date-indexed wide CSV into rows keyed by date.
pub fn read_dated_table(path: &Path, date_format: &str) -> Result<DatedRows, BacktestError> {
    let content = fs::read_to_string(path).map_err(|e| data_error(path, e))?;

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = rdr.headers().map_err(|e| data_error(path, e))?.clone();
    if headers.len() < 2 {
        return Err(data_error(path, "expected a date column and at least one asset column"));
    }
    let assets: Vec<&str> = headers.iter().skip(1).collect();

    let mut rows = DatedRows::new();
    for result in rdr.records() {
        let record = result.map_err(|e| data_error(path, format!("CSV parse error: {e}")))?;

        let date_str = record
            .get(0)
            .ok_or_else(|| data_error(path, "missing date column"))?;
        let date = NaiveDate::parse_from_str(date_str, date_format)
            .map_err(|e| data_error(path, format!("invalid date '{date_str}': {e}")))?;

        let mut row = BTreeMap::new();
        for (asset, cell) in assets.iter().zip(record.iter().skip(1)) {
            if cell.is_empty() {
                continue;
            }
            let value: f64 = cell.parse().map_err(|_| {
                data_error(path, format!("invalid value '{cell}' for {asset} on {date}"))
            })?;
            row.insert(asset.to_string(), value);
        }

        if rows.insert(date, row).is_some() {
            return Err(data_error(path, format!("duplicate date {date}")));
        }
    }

    Ok(rows)
}

impl DataPort for CsvDataAdapter {
    fn load_prices(&self) -> Result<PriceTable, BacktestError> {
        let rows = read_dated_table(&self.prices_path, &self.date_format)?;
        let mut table = PriceTable::new();
        for (date, row) in rows {
            table.insert_row(date, row);
        }
        table.validate()?;
        info!(
            path = %self.prices_path.display(),
            dates = table.len(),
            assets = table.assets().len(),
            "loaded prices"
        );
        Ok(table)
    }

    fn load_weights(&self) -> Result<WeightTable, BacktestError> {
        let rows = read_dated_table(&self.weights_path, &self.date_format)?;
        let mut table = WeightTable::new();
        for (date, row) in rows {
            table.insert_row(date, row);
        }
        table.validate()?;
        info!(
            path = %self.weights_path.display(),
            dates = table.len(),
            "loaded weights"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::price_port::PriceSource;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup(prices: &str, weights: &str) -> (TempDir, CsvDataAdapter) {
        let dir = TempDir::new().unwrap();
        let prices_path = dir.path().join("prices.csv");
        let weights_path = dir.path().join("weights.csv");
        fs::write(&prices_path, prices).unwrap();
        fs::write(&weights_path, weights).unwrap();
        (dir, CsvDataAdapter::new(prices_path, weights_path))
    }

    const PRICES: &str = "date,asset1,asset2,asset3\n\
        2020-01-02,2.0,5.0,8.0\n\
        2020-01-01,1.0,4.0,7.0\n";

    const WEIGHTS: &str = "date,asset1,asset2,asset3\n\
        2020-01-01,0.5,0.3,0.2\n";

    #[test]
    fn load_prices_sorts_by_date() {
        let (_dir, adapter) = setup(PRICES, WEIGHTS);
        let prices = adapter.load_prices().unwrap();
        assert_eq!(prices.timestamps(), vec![date(2020, 1, 1), date(2020, 1, 2)]);
        assert_eq!(prices.row_at(date(2020, 1, 2)).unwrap()["asset2"], 5.0);
    }

    #[test]
    fn load_weights_reads_rows() {
        let (_dir, adapter) = setup(PRICES, WEIGHTS);
        let weights = adapter.load_weights().unwrap();
        assert_eq!(weights.len(), 1);
        assert_eq!(weights.row_at(date(2020, 1, 1)).unwrap()["asset1"], 0.5);
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let (_dir, adapter) = setup("date,a\n2020-01-01,0\n", WEIGHTS);
        let err = adapter.load_prices().unwrap_err();
        assert!(matches!(err, BacktestError::InvalidPrice { asset, .. } if asset == "a"));
    }

    #[test]
    fn weights_must_sum_to_one() {
        let (_dir, adapter) = setup(PRICES, "date,a,b\n2020-01-01,0.5,0.4\n");
        let err = adapter.load_weights().unwrap_err();
        assert!(matches!(err, BacktestError::InvalidWeights { .. }));
    }

    #[test]
    fn empty_cells_are_skipped() {
        let (_dir, adapter) = setup("date,a,b\n2020-01-01,1.0,\n", WEIGHTS);
        let prices = adapter.load_prices().unwrap();
        let row = prices.row_at(date(2020, 1, 1)).unwrap();
        assert!(row.contains_key("a"));
        assert!(!row.contains_key("b"));
    }

    #[test]
    fn duplicate_dates_are_rejected() {
        let (_dir, adapter) = setup("date,a\n2020-01-01,1.0\n2020-01-01,2.0\n", WEIGHTS);
        let err = adapter.load_prices().unwrap_err();
        assert!(matches!(err, BacktestError::Data { reason } if reason.contains("duplicate")));
    }

    #[test]
    fn bad_number_is_a_data_error() {
        let (_dir, adapter) = setup("date,a\n2020-01-01,abc\n", WEIGHTS);
        assert!(matches!(adapter.load_prices(), Err(BacktestError::Data { .. })));
    }

    #[test]
    fn custom_date_format() {
        let (_dir, adapter) = setup("date,a\n02/01/2020,1.0\n", "date,a\n02/01/2020,1.0\n");
        let adapter = adapter.with_date_format("%d/%m/%Y");
        let prices = adapter.load_prices().unwrap();
        assert_eq!(prices.timestamps(), vec![date(2020, 1, 2)]);
    }

    #[test]
    fn missing_file_is_a_data_error() {
        let adapter = CsvDataAdapter::new(
            PathBuf::from("/nonexistent/prices.csv"),
            PathBuf::from("/nonexistent/weights.csv"),
        );
        assert!(matches!(adapter.load_prices(), Err(BacktestError::Data { .. })));
    }

    #[test]
    fn header_only_file_is_empty() {
        let (_dir, adapter) = setup("date,a\n", WEIGHTS);
        assert!(adapter.load_prices().unwrap().is_empty());
    }
}
