//! CLI definition and dispatch.
//!
//! This is the composition root: it reads the INI config, wires the CSV data
//! adapter, the allocation policy and the report writers together, and maps
//! errors to exit codes.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use crate::adapters::csv_adapter::CsvDataAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::report::chart_svg::SvgChartAdapter;
use crate::adapters::report::csv_report::{CsvReportAdapter, read_summary};
use crate::adapters::report::latex_table::{
    DEFAULT_CAPTION, LatexTableAdapter, TABLE_FILE_NAME, render_summary_table,
};
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, ParameterGrid};
use crate::domain::config_validation::{
    DEFAULT_DATE_FORMAT, cash_policy, optional_date, rate_list, require_string, strategy_kind,
    validate_config,
};
use crate::domain::error::BacktestError;
use crate::domain::policy::{AllocationPolicy, FixedSchedulePolicy, MomentumParams, MomentumPolicy};
use crate::domain::prices::WeightTable;
use crate::domain::stats::BacktestAnalysis;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "stratbt", about = "Weight-driven portfolio backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the backtest grid described by a config file
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [report] output_dir
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Validate config and data without running
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a config file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Build a LaTeX summary table from summary CSV files
    Latex {
        #[arg(short, long = "input", required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        caption: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, output.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Latex {
            inputs,
            output,
            caption,
        } => run_latex(&inputs, output.as_deref(), caption.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, BacktestError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_config(&adapter)?;
    Ok(adapter)
}

/// Relative paths in the config resolve against the config file's directory.
pub fn resolve_path(config_path: &Path, raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return path;
    }
    match config_path.parent() {
        Some(dir) => dir.join(path),
        None => path,
    }
}

/// Base config: the first transaction cost and risk-free rate of each list.
pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, BacktestError> {
    let grid = build_grid(config)?;
    Ok(BacktestConfig {
        initial_capital: config.get_double("backtest", "initial_capital", 100_000.0),
        transaction_cost: grid.transaction_costs.first().copied().unwrap_or(0.0),
        risk_free_rate: grid.risk_free_rates.first().copied().unwrap_or(0.0),
        cash_policy: cash_policy(config)?,
        start_date: optional_date(config, "backtest", "start_date")?,
        end_date: optional_date(config, "backtest", "end_date")?,
    })
}

pub fn build_grid(config: &dyn ConfigPort) -> Result<ParameterGrid, BacktestError> {
    Ok(ParameterGrid {
        transaction_costs: rate_list(config, "backtest", "transaction_cost")?,
        risk_free_rates: rate_list(config, "backtest", "risk_free_rate")?,
    })
}

pub fn build_data_adapter(
    config: &dyn ConfigPort,
    config_path: &Path,
) -> Result<CsvDataAdapter, BacktestError> {
    let prices = require_string(config, "data", "prices_path")?;
    let weights = require_string(config, "data", "weights_path")?;
    let date_format = config
        .get_string("data", "date_format")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
    Ok(CsvDataAdapter::new(
        resolve_path(config_path, &prices),
        resolve_path(config_path, &weights),
    )
    .with_date_format(date_format.trim()))
}

/// A fresh policy per run; policies keep state across calls.
pub fn build_policy(
    config: &dyn ConfigPort,
    schedule: WeightTable,
) -> Result<Box<dyn AllocationPolicy>, BacktestError> {
    match strategy_kind(config)?.as_str() {
        "momentum" => {
            let defaults = MomentumParams::default();
            let params = MomentumParams {
                lookback_months: config.get_int(
                    "strategy",
                    "lookback_months",
                    defaults.lookback_months as i64,
                ) as u32,
                skip_months: config.get_int("strategy", "skip_months", defaults.skip_months as i64)
                    as u32,
                warmup_rebalances: config.get_int(
                    "strategy",
                    "warmup_rebalances",
                    defaults.warmup_rebalances as i64,
                ) as usize,
            };
            Ok(Box::new(MomentumPolicy::new(schedule, params)))
        }
        _ => Ok(Box::new(FixedSchedulePolicy::new(schedule))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    pub output_dir: PathBuf,
    pub latex: bool,
    pub charts: bool,
    pub caption: String,
}

pub fn build_report_settings(
    config: &dyn ConfigPort,
    config_path: &Path,
    output_override: Option<&Path>,
) -> ReportSettings {
    let output_dir = match output_override {
        Some(dir) => dir.to_path_buf(),
        None => resolve_path(
            config_path,
            &config
                .get_string("report", "output_dir")
                .unwrap_or_else(|| "output".to_string()),
        ),
    };
    ReportSettings {
        output_dir,
        latex: config.get_bool("report", "latex", true),
        charts: config.get_bool("report", "charts", true),
        caption: config
            .get_string("report", "caption")
            .unwrap_or_else(|| DEFAULT_CAPTION.to_string()),
    }
}

/// Load data, run every grid combination, and analyse each run.
pub fn run_grid(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
) -> Result<Vec<BacktestAnalysis>, BacktestError> {
    let prices = data_port.load_prices()?;
    let schedule = data_port.load_weights()?;

    let base = build_backtest_config(config)?;
    let grid = build_grid(config)?;
    let timestamps = backtest_engine::select_timestamps(&prices, base.start_date, base.end_date);
    if timestamps.is_empty() {
        return Err(BacktestError::Data {
            reason: "no price dates inside the configured date range".into(),
        });
    }

    let mut analyses = Vec::new();
    for run_config in grid.expand(&base) {
        let mut policy = build_policy(config, schedule.clone())?;
        let result =
            backtest_engine::run_backtest(&prices, policy.as_mut(), &timestamps, &run_config)?;
        let mut analysis = BacktestAnalysis::new(result);
        let summary = analysis.compute_stats()?.summary.clone();
        info!(
            label = %analysis.label(),
            total_return = %format!("{:.2}%", summary.total_return * 100.0),
            annualized_return = %format!("{:.2}%", summary.annualized_return * 100.0),
            sharpe = %format!("{:.2}", summary.sharpe_ratio),
            max_drawdown = %format!("{:.2}%", summary.max_drawdown * 100.0),
            "run complete"
        );
        analyses.push(analysis);
    }
    Ok(analyses)
}

pub fn write_reports(
    analyses: &[BacktestAnalysis],
    settings: &ReportSettings,
) -> Result<Vec<PathBuf>, BacktestError> {
    let mut writers: Vec<Box<dyn ReportPort>> = vec![Box::new(CsvReportAdapter::new())];
    if settings.charts {
        writers.push(Box::new(SvgChartAdapter::new()));
    }
    if settings.latex {
        writers.push(Box::new(LatexTableAdapter::new(settings.caption.clone())));
    }

    let mut written = Vec::new();
    for writer in &writers {
        written.extend(writer.write_all(analyses, &settings.output_dir)?);
    }
    info!(files = written.len(), dir = %settings.output_dir.display(), "reports written");
    Ok(written)
}

pub fn run_backtest(config_path: &Path, output: Option<&Path>) -> Result<(), BacktestError> {
    let config = load_config(config_path)?;
    let data = build_data_adapter(&config, config_path)?;
    let settings = build_report_settings(&config, config_path, output);

    let analyses = run_grid(&data, &config)?;
    for path in write_reports(&analyses, &settings)? {
        println!("{}", path.display());
    }
    Ok(())
}

pub fn run_dry_run(config_path: &Path) -> Result<(), BacktestError> {
    let config = load_config(config_path)?;
    let data = build_data_adapter(&config, config_path)?;
    let base = build_backtest_config(&config)?;
    let grid = build_grid(&config)?;

    let prices = data.load_prices()?;
    let schedule = data.load_weights()?;
    let timestamps = backtest_engine::select_timestamps(&prices, base.start_date, base.end_date);

    info!(
        price_dates = prices.len(),
        assets = prices.assets().len(),
        weight_dates = schedule.len(),
        steps = timestamps.len(),
        runs = grid.expand(&base).len(),
        "dry run ok"
    );
    Ok(())
}

pub fn run_validate(config_path: &Path) -> Result<(), BacktestError> {
    let config = load_config(config_path)?;
    let grid = build_grid(&config)?;
    info!(
        strategy = %strategy_kind(&config)?,
        runs = grid.transaction_costs.len() * grid.risk_free_rates.len(),
        "config is valid"
    );
    Ok(())
}

pub fn run_latex(
    inputs: &[PathBuf],
    output: Option<&Path>,
    caption: Option<&str>,
) -> Result<(), BacktestError> {
    let summaries = inputs
        .iter()
        .map(|path| read_summary(path))
        .collect::<Result<Vec<_>, _>>()?;
    let table = render_summary_table(&summaries, caption.unwrap_or(DEFAULT_CAPTION));

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(TABLE_FILE_NAME));
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(&output, table)?;
    println!("{}", output.display());
    Ok(())
}
