//! Configuration validation.
//!
//! Runs before any data is loaded and reports the first offending
//! `[section] key`. The parsing helpers are shared with the CLI builders so
//! a config that validates always builds.

use crate::domain::error::BacktestError;
use crate::domain::ledger::CashPolicy;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_data_config(config)?;
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    require_string(config, "data", "prices_path")?;
    require_string(config, "data", "weights_path")?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    validate_initial_capital(config)?;
    rate_list(config, "backtest", "transaction_cost")?;
    rate_list(config, "backtest", "risk_free_rate")?;
    cash_policy(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    match strategy_kind(config)?.as_str() {
        "fixed" => Ok(()),
        _ => validate_momentum(config),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> BacktestError {
    BacktestError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, BacktestError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(BacktestError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let value = config.get_double("backtest", "initial_capital", 100_000.0);
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

/// Comma list of rates in `[0, 1)`; `[0.0]` when the key is absent.
pub fn rate_list(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Vec<f64>, BacktestError> {
    let values = match config.get_double_list(section, key) {
        None => return Ok(vec![0.0]),
        Some(Err(raw)) => {
            return Err(invalid(section, key, format!("'{raw}' is not a list of numbers")));
        }
        Some(Ok(values)) => values,
    };
    if values.is_empty() {
        return Err(invalid(section, key, "list must not be empty"));
    }
    if let Some(bad) = values.iter().find(|v| !(0.0..1.0).contains(*v)) {
        return Err(invalid(section, key, format!("{bad} must be between 0 and 1")));
    }
    Ok(values)
}

pub fn cash_policy(config: &dyn ConfigPort) -> Result<CashPolicy, BacktestError> {
    match config.get_string("backtest", "cash_policy") {
        None => Ok(CashPolicy::default()),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: String| invalid("backtest", "cash_policy", e)),
    }
}

/// Optional `YYYY-MM-DD` date.
pub fn optional_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, BacktestError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), DEFAULT_DATE_FORMAT)
            .map(Some)
            .map_err(|_| {
                invalid(
                    section,
                    key,
                    format!("invalid {key} format, expected YYYY-MM-DD"),
                )
            }),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    let start = optional_date(config, "backtest", "start_date")?;
    let end = optional_date(config, "backtest", "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(invalid(
                "backtest",
                "start_date",
                "start_date must not be after end_date",
            ));
        }
    }
    Ok(())
}

/// `fixed` (default) or `momentum`.
pub fn strategy_kind(config: &dyn ConfigPort) -> Result<String, BacktestError> {
    let kind = config
        .get_string("strategy", "kind")
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "fixed".to_string());
    match kind.as_str() {
        "fixed" | "momentum" => Ok(kind),
        other => Err(invalid(
            "strategy",
            "kind",
            format!("unknown strategy '{other}', expected fixed or momentum"),
        )),
    }
}

fn validate_momentum(config: &dyn ConfigPort) -> Result<(), BacktestError> {
    // Going to cash is an all-zero target, which replace would zero out.
    if cash_policy(config)? == CashPolicy::Replace {
        return Err(invalid(
            "backtest",
            "cash_policy",
            "cash_policy = replace cannot be used with kind = momentum",
        ));
    }
    let lookback = config.get_int("strategy", "lookback_months", 2);
    if lookback < 1 {
        return Err(invalid(
            "strategy",
            "lookback_months",
            "lookback_months must be at least 1",
        ));
    }
    let skip = config.get_int("strategy", "skip_months", 1);
    if skip < 0 || skip >= lookback {
        return Err(invalid(
            "strategy",
            "skip_months",
            "skip_months must be non-negative and less than lookback_months",
        ));
    }
    if config.get_int("strategy", "warmup_rebalances", 2) < 0 {
        return Err(invalid(
            "strategy",
            "warmup_rebalances",
            "warmup_rebalances must be non-negative",
        ));
    }
    Ok(())
}
