//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{Settings, validate_config};
use crate::domain::criteria::CriteriaReport;
use crate::domain::error::BacktestError;
use crate::domain::num::{FloatBits, Num, NumMode};
use crate::domain::record::TradingRecord;
use crate::domain::rule_builder::compile_strategy;
use crate::domain::rule_parser;
use crate::domain::runner::SeriesManager;
use crate::domain::series::BarSeries;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "tabacktest", about = "Bar series strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// CSV file to use instead of `[data] path`
        #[arg(long)]
        data: Option<PathBuf>,
        /// Load data and bind the strategy without running it
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            dry_run,
        } => run_backtest(&config, data.as_deref(), dry_run),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, BacktestError> {
    FileConfigAdapter::from_file(path).map_err(|e| BacktestError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Print `err` to stderr, with a caret under the offending rule text when
/// the error is a parse failure, and map it to an exit code.
fn report_error(err: &BacktestError, config: Option<&dyn ConfigPort>) -> ExitCode {
    if let (BacktestError::RuleParse(_), Some(config)) = (err, config) {
        for key in ["entry", "exit"] {
            let Some(text) = config.get_non_empty("strategy", key) else {
                continue;
            };
            if let Err(parse_err) = rule_parser::parse(&text) {
                eprintln!(
                    "error: failed to parse {}:\n{}",
                    key,
                    parse_err.display_with_context(&text)
                );
                return ExitCode::from(err);
            }
        }
    }
    eprintln!("error: {err}");
    ExitCode::from(err)
}

fn load_settings(
    config_path: &Path,
    data_override: Option<&Path>,
) -> Result<(FileConfigAdapter, Settings), ExitCode> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path).map_err(|e| report_error(&e, None))?;
    let settings = validate_config(&adapter, data_override)
        .map_err(|e| report_error(&e, Some(&adapter)))?;
    Ok((adapter, settings))
}

fn run_backtest(config_path: &Path, data_override: Option<&Path>, dry_run: bool) -> ExitCode {
    let (adapter, settings) = match load_settings(config_path, data_override) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let data_port = CsvAdapter::new(&settings.data.path);
    let outcome = match settings.numeric {
        NumMode::Decimal(_) => execute::<Decimal>(&data_port, &settings, dry_run),
        NumMode::Float(FloatBits::F64) => execute::<f64>(&data_port, &settings, dry_run),
        NumMode::Float(FloatBits::F32) => execute::<f32>(&data_port, &settings, dry_run),
    };

    match outcome {
        Ok(rendered) => {
            print!("{rendered}");
            ExitCode::SUCCESS
        }
        Err(e) => report_error(&e, Some(&adapter)),
    }
}

fn execute<N: Num>(
    data_port: &dyn DataPort<N>,
    settings: &Settings,
    dry_run: bool,
) -> Result<String, BacktestError> {
    if dry_run {
        return dry_run_pipeline(data_port, settings);
    }
    run_pipeline(data_port, settings).map(|report| report.render())
}

/// Output of one backtest run.
#[derive(Debug)]
pub struct BacktestReport<N: Num> {
    pub strategy: String,
    pub series: Arc<BarSeries<N>>,
    pub record: TradingRecord<N>,
    pub criteria: BTreeMap<String, N>,
}

/// Fetch the series, compile the strategy, run it and evaluate the standard
/// criteria.
pub fn run_pipeline<N: Num>(
    data_port: &dyn DataPort<N>,
    settings: &Settings,
) -> Result<BacktestReport<N>, BacktestError> {
    let series = data_port
        .fetch_series(&settings.data.name, settings.numeric.precision())?
        .shared();
    let strategy = compile_strategy(
        &series,
        &settings.strategy.name,
        &settings.strategy.entry,
        &settings.strategy.exit,
        settings.strategy.unstable_bars,
    )?;

    let manager = SeriesManager::new(Arc::clone(&series));
    let record = manager.run(&strategy, &settings.run)?;
    let criteria = CriteriaReport::standard(&settings.run).evaluate(&series, &record);
    info!(
        strategy = %strategy.name,
        trades = record.trade_count(),
        num = %settings.numeric,
        "backtest complete"
    );

    Ok(BacktestReport {
        strategy: strategy.name,
        series,
        record,
        criteria,
    })
}

fn dry_run_pipeline<N: Num>(
    data_port: &dyn DataPort<N>,
    settings: &Settings,
) -> Result<String, BacktestError> {
    let series = data_port
        .fetch_series(&settings.data.name, settings.numeric.precision())?
        .shared();
    let strategy = compile_strategy(
        &series,
        &settings.strategy.name,
        &settings.strategy.entry,
        &settings.strategy.exit,
        settings.strategy.unstable_bars,
    )?;

    let mut out = String::new();
    let _ = writeln!(out, "Dry run: {} ({})", strategy.name, settings.numeric);
    let _ = writeln!(out, "Series:  {} ({} bars)", series.name(), series.len());
    let _ = writeln!(out, "Entry:   {}", strategy.entry_rule);
    let _ = writeln!(out, "Exit:    {}", strategy.exit_rule);
    let _ = writeln!(out, "Unstable bars: {}", strategy.unstable_bars);
    Ok(out)
}

impl<N: Num> BacktestReport<N> {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Strategy: {} on {} ({} bars)",
            self.strategy,
            self.series.name(),
            self.series.len()
        );
        let _ = writeln!(out, "Side:     {}", self.record.side());
        let _ = writeln!(out, "\nPositions: {}", self.record.trade_count());

        for (i, position) in self.record.positions().iter().enumerate() {
            let timestamp = |index: usize| {
                self.series
                    .bar(index)
                    .map(|b| b.timestamp.to_string())
                    .unwrap_or_default()
            };
            let (Some(exit_index), Some(exit_price), Some(profit)) =
                (position.exit_index, position.exit_price, position.profit())
            else {
                continue;
            };
            let _ = writeln!(
                out,
                "  #{:<3} entry {:>5} {} @ {}  exit {:>5} {} @ {}  profit {}",
                i + 1,
                position.entry_index,
                timestamp(position.entry_index),
                position.entry_price,
                exit_index,
                timestamp(exit_index),
                exit_price,
                profit
            );
        }
        if let Some(open) = self.record.current_position() {
            let _ = writeln!(
                out,
                "  open  entry {:>5} @ {}",
                open.entry_index, open.entry_price
            );
        }

        let _ = writeln!(out, "\nCriteria:");
        for (name, value) in &self.criteria {
            let _ = writeln!(out, "  {:<40} {}", name, value);
        }
        out
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let (_, settings) = match load_settings(config_path, None) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let parsed = rule_parser::parse(&settings.strategy.entry)
        .and_then(|entry| rule_parser::parse(&settings.strategy.exit).map(|exit| (entry, exit)));
    let (entry, exit) = match parsed {
        Ok(rules) => rules,
        Err(e) => return report_error(&BacktestError::from(e), None),
    };

    println!("Config valid: {}", config_path.display());
    println!("  numeric:  {}", settings.numeric);
    println!("  data:     {} ({})", settings.data.name, settings.data.path.display());
    println!("  strategy: {}", settings.strategy.name);
    println!("  entry:    {}", entry);
    println!("  exit:     {}", exit);
    let indicators: Vec<String> = entry
        .indicators()
        .into_iter()
        .chain(exit.indicators())
        .map(|spec| spec.to_string())
        .collect();
    if !indicators.is_empty() {
        println!("  indicators: {}", indicators.join(", "));
    }
    println!(
        "  backtest: side {}, price {}, end of series {}",
        settings.run.side, settings.run.price, settings.run.end_of_series
    );
    ExitCode::SUCCESS
}
