//! Backtest driver.
//!
//! Replays loaded bars on a unified timeline through the indicator feed,
//! the engine and an execution collaborator. Per instrument bar:
//! trailing stops, feed update, decision, then execution of the decision.

use crate::domain::config::StrategyConfig;
use crate::domain::engine::{BarOutcome, SignalEngine};
use crate::domain::error::ConfluenceError;
use crate::domain::instrument::InstrumentId;
use crate::domain::instrument_data::{build_unified_timeline, load_instruments, SkippedInstrument};
use crate::domain::metrics::{EquityPoint, EquitySummary, RunReport};
use crate::domain::policy::Instruction;
use crate::ports::data_port::DataPort;
use crate::ports::execution_port::ExecutionPort;
use crate::ports::indicator_port::IndicatorFeed;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub report: RunReport,
    pub equity_curve: Vec<EquityPoint>,
    pub instructions: Vec<Instruction>,
    pub skipped: Vec<SkippedInstrument>,
}

/// Bars an instrument needs before every enabled indicator can emit a
/// crossing (first value plus one more bar to compare against).
pub fn minimum_bars(config: &StrategyConfig) -> usize {
    config
        .engine
        .aggregation
        .enabled
        .iter()
        .map(|&kind| config.indicators.history_needed(kind))
        .max()
        .unwrap_or(1)
        + 1
}

pub fn run_backtest(
    data_port: &dyn DataPort,
    feed: &mut dyn IndicatorFeed,
    execution: &mut dyn ExecutionPort,
    config: &StrategyConfig,
) -> Result<BacktestResult, ConfluenceError> {
    let loaded = load_instruments(
        data_port,
        &config.instruments,
        config.backtest.start_date,
        config.backtest.end_date,
        minimum_bars(config),
    )?;

    let instruments: Vec<InstrumentId> = loaded.data.iter().map(|d| d.instrument.clone()).collect();
    let mut engine = SignalEngine::new(&instruments, config.engine.clone());
    let timeline = build_unified_timeline(&loaded.data);
    info!(
        instruments = instruments.len(),
        bars = timeline.len(),
        "starting backtest"
    );

    let mut equity_curve = Vec::with_capacity(timeline.len());
    let mut instructions = Vec::new();

    for &time in &timeline {
        for data in &loaded.data {
            let Some(bar) = data.get_bar(time) else {
                continue;
            };

            for fill in execution.process_bar(bar) {
                engine.on_fill(&fill)?;
            }

            let snapshot = feed.update(bar)?;
            let outcome = engine.on_bar(bar, &snapshot)?;

            if let BarOutcome::Evaluated {
                instruction: Some(instruction),
                ..
            } = outcome
            {
                for fill in execution.submit(&instruction, bar) {
                    engine.on_fill(&fill)?;
                }
                instructions.push(instruction);
            }
        }

        equity_curve.push(EquityPoint {
            time,
            equity: execution.equity(),
        });
    }

    let mut report = engine.report();
    report.equity = Some(EquitySummary::compute(
        config.backtest.initial_capital,
        &equity_curve,
    ));
    info!(
        trades = report.total_trades(),
        instructions = instructions.len(),
        "backtest complete"
    );

    Ok(BacktestResult {
        report,
        equity_curve,
        instructions,
        skipped: loaded.skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::signal::IndicatorKind;
    use std::collections::BTreeSet;

    fn sample_config() -> StrategyConfig {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\nstart_date = 2024-01-01\nend_date = 2024-12-31\ninstrument = BHP\n",
        )
        .unwrap();
        StrategyConfig::load(&adapter).unwrap()
    }

    #[test]
    fn minimum_bars_follows_slowest_enabled_indicator() {
        let mut config = sample_config();
        // stochastic RSI 14/14/3/3 is slowest
        assert_eq!(minimum_bars(&config), 33);

        config.engine.aggregation.enabled = BTreeSet::from([IndicatorKind::Ma]);
        assert_eq!(minimum_bars(&config), 21);

        config.engine.aggregation.enabled = BTreeSet::from([IndicatorKind::Vol]);
        assert_eq!(minimum_bars(&config), 3);
    }

    #[test]
    fn backtest_config_from_ini() {
        let c = sample_config().backtest;
        assert_eq!(c.start_date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!((c.initial_capital - 100_000.0).abs() < f64::EPSILON);
        assert!((c.commission_pct - 0.0).abs() < f64::EPSILON);
        assert_eq!(c.data_dir, PathBuf::from("."));
    }
}
