//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for stratbt.
#[derive(Debug, thiserror::Error)]
pub enum BacktestError {
    #[error("no price for {asset} on {date}")]
    MissingPrice { asset: String, date: NaiveDate },

    #[error("no price row for {date}")]
    MissingTimestamp { date: NaiveDate },

    #[error("{what} requested before the backtest was analysed")]
    NotRun { what: String },

    #[error("weights on {date} sum to {sum}, expected 1")]
    InvalidWeights { date: NaiveDate, sum: f64 },

    #[error("invalid price {price} for {asset} on {date}: prices must be positive")]
    InvalidPrice {
        asset: String,
        date: NaiveDate,
        price: f64,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BacktestError> for std::process::ExitCode {
    fn from(err: &BacktestError) -> Self {
        let code: u8 = match err {
            BacktestError::Io(_) => 1,
            BacktestError::ConfigParse { .. }
            | BacktestError::ConfigMissing { .. }
            | BacktestError::ConfigInvalid { .. } => 2,
            BacktestError::Data { .. }
            | BacktestError::InvalidWeights { .. }
            | BacktestError::InvalidPrice { .. } => 3,
            BacktestError::MissingPrice { .. } | BacktestError::MissingTimestamp { .. } => 4,
            BacktestError::NotRun { .. } => 5,
            BacktestError::Report { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
