//! Typed run configuration built from a [`ConfigPort`].

use crate::domain::aggregator::{AggregationConfig, AggregationMode};
use crate::domain::backtest::BacktestConfig;
use crate::domain::config_validation::{instrument_list, parse_date, read_usize, validate_all};
use crate::domain::engine::EngineConfig;
use crate::domain::error::ConfluenceError;
use crate::domain::evaluator::EvaluatorParams;
use crate::domain::indicator::{AverageKind, IndicatorParams};
use crate::domain::instrument::{parse_instruments, InstrumentId};
use crate::domain::policy::{PolicyConfig, ScaleInTrade};
use crate::domain::signal::{parse_indicator_list, IndicatorKind};
use crate::ports::config_port::ConfigPort;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

impl FromStr for ReportFormat {
    type Err = ConfluenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            other => Err(ConfluenceError::invalid(
                "report",
                "format",
                format!("unknown format '{other}', expected csv or json"),
            )),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Csv => write!(f, "csv"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportConfig {
    pub output: Option<PathBuf>,
    pub format: ReportFormat,
}

/// Everything a run needs, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub instruments: Vec<InstrumentId>,
    pub backtest: BacktestConfig,
    pub engine: EngineConfig,
    pub indicators: IndicatorParams,
    pub report: ReportConfig,
}

impl StrategyConfig {
    /// Validate every section, then build the typed config.
    pub fn load(config: &dyn ConfigPort) -> Result<Self, ConfluenceError> {
        validate_all(config)?;

        let (key, raw) = instrument_list(config)?;
        let instruments = parse_instruments(&raw)
            .map_err(|e| ConfluenceError::invalid("backtest", key, e.to_string()))?;

        Ok(StrategyConfig {
            instruments,
            backtest: load_backtest(config)?,
            engine: load_engine(config)?,
            indicators: load_indicators(config)?,
            report: load_report(config)?,
        })
    }

    /// Keep only `instrument`, which must be configured.
    pub fn restrict_to(&mut self, instrument: &InstrumentId) -> Result<(), ConfluenceError> {
        if !self.instruments.contains(instrument) {
            return Err(ConfluenceError::UnknownInstrument(instrument.to_string()));
        }
        self.instruments = vec![instrument.clone()];
        Ok(())
    }
}

fn load_backtest(config: &dyn ConfigPort) -> Result<BacktestConfig, ConfluenceError> {
    Ok(BacktestConfig {
        start_date: parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?,
        end_date: parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?,
        initial_capital: config.get_double("backtest", "initial_capital", 100_000.0),
        commission_per_trade: config.get_double("backtest", "commission_per_trade", 0.0),
        commission_pct: config.get_double("backtest", "commission_pct", 0.0),
        slippage_pct: config.get_double("backtest", "slippage_pct", 0.0),
        data_dir: config
            .get_string("backtest", "data_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    })
}

fn load_engine(config: &dyn ConfigPort) -> Result<EngineConfig, ConfluenceError> {
    let enabled = match config.get_string("signals", "enabled") {
        Some(list) => parse_indicator_list(&list)
            .map_err(|e| ConfluenceError::invalid("signals", "enabled", e.to_string()))?,
        None => IndicatorKind::ALL.into_iter().collect::<BTreeSet<_>>(),
    };
    let weights: BTreeMap<IndicatorKind, f64> = IndicatorKind::ALL
        .into_iter()
        .map(|kind| {
            let key = format!("{}_weight", kind.key());
            (kind, config.get_double("signals", &key, 1.0))
        })
        .collect();
    let mode = match config.get_string("signals", "mode") {
        Some(m) => m
            .parse::<AggregationMode>()
            .map_err(|e| ConfluenceError::invalid("signals", "mode", e))?,
        None => AggregationMode::default(),
    };

    let aggregation = AggregationConfig {
        enabled,
        weights,
        mode,
        entry_threshold: config.get_double("signals", "entry_threshold", 5.0),
        exit_threshold: config.get_double("signals", "exit_threshold", 5.0),
    };

    let evaluators = EvaluatorParams {
        stoch_lower: config.get_double("indicators", "stoch_lower", 20.0),
        stoch_upper: config.get_double("indicators", "stoch_upper", 80.0),
        stoch_lookback: read_usize(config, "indicators", "stoch_lookback", 3)?,
        mfi_lower: config.get_double("indicators", "mfi_lower", 20.0),
        mfi_upper: config.get_double("indicators", "mfi_upper", 80.0),
        volume_multiplier: config.get_double("indicators", "volume_multiplier", 2.0),
        volume_lookback: read_usize(config, "indicators", "volume_lookback", 35)?,
    };

    let scale_in_trade = match config.get_string("position", "scale_in_trade") {
        Some(s) => s
            .parse::<ScaleInTrade>()
            .map_err(|e| ConfluenceError::invalid("position", "scale_in_trade", e))?,
        None => ScaleInTrade::default(),
    };
    let policy = PolicyConfig {
        first_trade_allocation: config.get_double("position", "first_trade_allocation", 0.1),
        repeat_trade_allocation: config.get_double("position", "repeat_trade_allocation", 0.1),
        max_allocation: config.get_double("position", "max_allocation", 1.0),
        flip_on_reversal: config.get_bool("position", "flip_on_reversal", true),
        allow_shorting: config.get_bool("position", "allow_shorting", true),
        scale_in_trade,
        trailing_stop_pct: config
            .get_bool("position", "trailing_stop", false)
            .then(|| config.get_double("position", "trailing_stop_pct", 5.0)),
    };

    Ok(EngineConfig {
        aggregation,
        evaluators,
        policy,
        trigger_window: read_usize(config, "signals", "trigger_window", 5)?,
        warmup_bars: read_usize(config, "signals", "warmup_bars", 0)?,
    })
}

fn load_indicators(config: &dyn ConfigPort) -> Result<IndicatorParams, ConfluenceError> {
    let period = |key: &str, default: usize| read_usize(config, "indicators", key, default);
    let macd_average = match config.get_string("indicators", "macd_average") {
        Some(s) => s.parse::<AverageKind>()?,
        None => AverageKind::default(),
    };
    Ok(IndicatorParams {
        ma_fast: period("ma_fast", 9)?,
        ma_slow: period("ma_slow", 20)?,
        stoch_period: period("stoch_period", 14)?,
        stoch_smooth_k: period("stoch_smooth_k", 3)?,
        stoch_smooth_d: period("stoch_smooth_d", 3)?,
        mfi_period: period("mfi_period", 14)?,
        macd_fast: period("macd_fast", 3)?,
        macd_slow: period("macd_slow", 10)?,
        macd_signal: period("macd_signal", 16)?,
        macd_average,
    })
}

fn load_report(config: &dyn ConfigPort) -> Result<ReportConfig, ConfluenceError> {
    let format = match config.get_string("report", "format") {
        Some(f) => f.parse()?,
        None => ReportFormat::default(),
    };
    Ok(ReportConfig {
        output: config.get_string("report", "output").map(PathBuf::from),
        format,
    })
}

impl fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.backtest;
        let e = &self.engine;
        let a = &e.aggregation;
        let p = &e.policy;
        let i = &self.indicators;

        let instruments: Vec<&str> = self.instruments.iter().map(|id| id.as_str()).collect();
        writeln!(f, "[backtest]")?;
        writeln!(f, "instruments = {}", instruments.join(", "))?;
        writeln!(f, "start_date = {}", b.start_date)?;
        writeln!(f, "end_date = {}", b.end_date)?;
        writeln!(f, "initial_capital = {}", b.initial_capital)?;
        writeln!(f, "commission_per_trade = {}", b.commission_per_trade)?;
        writeln!(f, "commission_pct = {}", b.commission_pct)?;
        writeln!(f, "slippage_pct = {}", b.slippage_pct)?;
        writeln!(f, "data_dir = {}", b.data_dir.display())?;

        let enabled: Vec<&str> = a.enabled.iter().map(|k| k.name()).collect();
        writeln!(f, "\n[signals]")?;
        writeln!(f, "trigger_window = {}", e.trigger_window)?;
        writeln!(f, "warmup_bars = {}", e.warmup_bars)?;
        writeln!(f, "mode = {}", a.mode)?;
        writeln!(f, "enabled = {}", enabled.join(", "))?;
        for kind in &a.enabled {
            writeln!(f, "{}_weight = {}", kind.key(), a.weight(*kind))?;
        }
        writeln!(f, "entry_threshold = {}", a.entry_threshold)?;
        writeln!(f, "exit_threshold = {}", a.exit_threshold)?;

        writeln!(f, "\n[indicators]")?;
        writeln!(f, "ma_fast = {}", i.ma_fast)?;
        writeln!(f, "ma_slow = {}", i.ma_slow)?;
        writeln!(f, "stoch_period = {}", i.stoch_period)?;
        writeln!(f, "stoch_smooth_k = {}", i.stoch_smooth_k)?;
        writeln!(f, "stoch_smooth_d = {}", i.stoch_smooth_d)?;
        writeln!(f, "stoch_lower = {}", e.evaluators.stoch_lower)?;
        writeln!(f, "stoch_upper = {}", e.evaluators.stoch_upper)?;
        writeln!(f, "stoch_lookback = {}", e.evaluators.stoch_lookback)?;
        writeln!(f, "mfi_period = {}", i.mfi_period)?;
        writeln!(f, "mfi_lower = {}", e.evaluators.mfi_lower)?;
        writeln!(f, "mfi_upper = {}", e.evaluators.mfi_upper)?;
        writeln!(f, "macd_fast = {}", i.macd_fast)?;
        writeln!(f, "macd_slow = {}", i.macd_slow)?;
        writeln!(f, "macd_signal = {}", i.macd_signal)?;
        writeln!(f, "macd_average = {}", i.macd_average)?;
        writeln!(f, "volume_multiplier = {}", e.evaluators.volume_multiplier)?;
        writeln!(f, "volume_lookback = {}", e.evaluators.volume_lookback)?;

        writeln!(f, "\n[position]")?;
        writeln!(f, "first_trade_allocation = {}", p.first_trade_allocation)?;
        writeln!(f, "repeat_trade_allocation = {}", p.repeat_trade_allocation)?;
        writeln!(f, "max_allocation = {}", p.max_allocation)?;
        writeln!(f, "flip_on_reversal = {}", p.flip_on_reversal)?;
        writeln!(f, "allow_shorting = {}", p.allow_shorting)?;
        writeln!(f, "scale_in_trade = {}", p.scale_in_trade)?;
        match p.trailing_stop_pct {
            Some(pct) => {
                writeln!(f, "trailing_stop = true")?;
                writeln!(f, "trailing_stop_pct = {pct}")?;
            }
            None => writeln!(f, "trailing_stop = false")?,
        }

        writeln!(f, "\n[report]")?;
        if let Some(output) = &self.report.output {
            writeln!(f, "output = {}", output.display())?;
        }
        write!(f, "format = {}", self.report.format)
    }
}
