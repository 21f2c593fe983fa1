//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::{render_combos, CsvReportAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::{render_json, JsonReportAdapter};
use crate::adapters::paper_execution::{ExecutionConfig, PaperExecution};
use crate::domain::backtest::{run_backtest, BacktestResult};
use crate::domain::config::{ReportFormat, StrategyConfig};
use crate::domain::error::ConfluenceError;
use crate::domain::indicator::IndicatorBank;
use crate::domain::instrument::InstrumentId;
use crate::domain::instrument_data::SkipReason;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(
    name = "confluence",
    about = "Multi-indicator signal confluence backtester"
)]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over CSV bars
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// csv or json
        #[arg(short, long)]
        format: Option<String>,
        /// Run only this configured instrument
        #[arg(long)]
        instrument: Option<String>,
    },
    /// Validate a configuration and print it resolved
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Backtest {
            config,
            output,
            format,
            instrument,
        } => run_backtest_command(&config, output, format.as_deref(), instrument.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Logs go to stderr; stdout carries report output only.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Ignore a subscriber already installed by an earlier call.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

pub fn load_config(path: &Path) -> Result<StrategyConfig, ConfluenceError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    StrategyConfig::load(&adapter)
}

/// Load the config and apply command-line overrides.
pub fn resolve_config(
    path: &Path,
    instrument: Option<&str>,
    output: Option<PathBuf>,
    format: Option<&str>,
) -> Result<StrategyConfig, ConfluenceError> {
    let mut config = load_config(path)?;
    if let Some(id) = instrument {
        config.restrict_to(&InstrumentId::new(id))?;
    }
    if output.is_some() {
        config.report.output = output;
    }
    if let Some(f) = format {
        config.report.format = f.parse()?;
    }
    Ok(config)
}

fn run_backtest_command(
    config_path: &Path,
    output: Option<PathBuf>,
    format: Option<&str>,
    instrument: Option<&str>,
) -> Result<(), ConfluenceError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = resolve_config(config_path, instrument, output, format)?;
    let data_port = CsvAdapter::new(config.backtest.data_dir.clone());
    run_backtest_pipeline(&data_port, &config).map(|_| ())
}

/// Backtest, print the summary to stderr and emit the report.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    config: &StrategyConfig,
) -> Result<BacktestResult, ConfluenceError> {
    eprintln!(
        "Running backtest: {} instruments, {} to {}",
        config.instruments.len(),
        config.backtest.start_date,
        config.backtest.end_date,
    );

    let mut feed = IndicatorBank::new(&config.instruments, &config.indicators);
    let mut execution = PaperExecution::new(ExecutionConfig::from(&config.backtest));
    let result = run_backtest(data_port, &mut feed, &mut execution, config)?;

    print_summary(&result);
    emit_report(&result, config)?;
    Ok(result)
}

fn print_summary(result: &BacktestResult) {
    for skipped in &result.skipped {
        match skipped.reason {
            SkipReason::NoData => eprintln!("  skipped {}: no data", skipped.instrument),
            SkipReason::InsufficientBars { bars } => {
                eprintln!("  skipped {}: only {} bars", skipped.instrument, bars)
            }
        }
    }

    let report = &result.report;
    eprintln!("\n=== Aggregate Results ===");
    if let Some(equity) = &report.equity {
        eprintln!("Final Equity:     {:.2}", equity.final_equity);
        eprintln!("Total Return:     {:.2}%", equity.total_return * 100.0);
        eprintln!("Max Drawdown:     -{:.1}%", equity.max_drawdown * 100.0);
    }
    eprintln!("Instructions:     {}", result.instructions.len());
    eprintln!("Closed Trades:    {}", report.total_trades());
    eprintln!("Total PnL:        {:.2}", report.total_pnl());

    let combos: Vec<_> = report.combos().collect();
    if !combos.is_empty() {
        eprintln!("\n=== Per-Combination Summary ===");
        for c in combos {
            let pnl_sign = if c.total_pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {} {}:  {} trades, {:.1}% win rate, avg {:.2}%, {}{:.2}",
                c.instrument,
                c.combo,
                c.count,
                c.win_rate,
                c.avg_return,
                pnl_sign,
                c.total_pnl,
            );
        }
    }
}

fn emit_report(result: &BacktestResult, config: &StrategyConfig) -> Result<(), ConfluenceError> {
    match &config.report.output {
        Some(path) => {
            let writer: Box<dyn ReportPort> = match config.report.format {
                ReportFormat::Csv => Box::new(CsvReportAdapter::new()),
                ReportFormat::Json => Box::new(JsonReportAdapter::new()),
            };
            writer.write(&result.report, path)?;
            eprintln!("\nReport written to: {}", path.display());
        }
        None => {
            let rendered = match config.report.format {
                ReportFormat::Csv => render_combos(&result.report)?,
                ReportFormat::Json => render_json(&result.report)?,
            };
            println!("{}", rendered.trim_end());
        }
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), ConfluenceError> {
    eprintln!("Validating config: {}", config_path.display());
    let config = load_config(config_path)?;
    println!("{config}");
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backtest_arguments() {
        let cli = Cli::try_parse_from([
            "confluence",
            "backtest",
            "--config",
            "strategy.ini",
            "-o",
            "out.json",
            "--format",
            "json",
            "--instrument",
            "aapl",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Backtest {
                config,
                output,
                format,
                instrument,
            } => {
                assert_eq!(config, PathBuf::from("strategy.ini"));
                assert_eq!(output, Some(PathBuf::from("out.json")));
                assert_eq!(format.as_deref(), Some("json"));
                assert_eq!(instrument.as_deref(), Some("aapl"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn validate_requires_config() {
        assert!(Cli::try_parse_from(["confluence", "validate"]).is_err());
        assert!(Cli::try_parse_from(["confluence", "validate", "-c", "x.ini"]).is_ok());
    }
}
