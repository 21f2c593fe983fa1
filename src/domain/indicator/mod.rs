//! Streaming technical indicators.
//!
//! The engine never computes indicators itself; it consumes one
//! [`IndicatorSnapshot`] per bar from an [`IndicatorFeed`]. This module is
//! the default feed: bar-by-bar indicators that report `None` until enough
//! history has accumulated.
//!
//! - `Sma`, `Ema`: moving averages
//! - `Macd`: oscillator and signal line over a chosen average
//! - `Rsi`, `StochRsi`: Wilder RSI and its stochastic K/D
//! - `Mfi`: money flow index
//! - [`IndicatorBank`]: one set of the above per instrument
//!
//! [`IndicatorFeed`]: crate::ports::indicator_port::IndicatorFeed

pub mod bank;
pub mod ema;
pub mod macd;
pub mod mfi;
pub mod rsi;
pub mod sma;
pub mod stoch_rsi;

pub use bank::IndicatorBank;
pub use ema::Ema;
pub use macd::Macd;
pub use mfi::Mfi;
pub use rsi::Rsi;
pub use sma::Sma;
pub use stoch_rsi::StochRsi;

use crate::domain::error::ConfluenceError;
use crate::domain::signal::IndicatorKind;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaValue {
    pub fast: f64,
    pub slow: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochValue {
    pub k: f64,
    pub d: f64,
}

/// Indicator values for one instrument at one bar. A component is `None`
/// until its indicator is ready.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorSnapshot {
    pub ma: Option<MaValue>,
    pub macd: Option<MacdValue>,
    pub stoch: Option<StochValue>,
    pub mfi: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AverageKind {
    #[default]
    Simple,
    Exponential,
}

impl fmt::Display for AverageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AverageKind::Simple => write!(f, "simple"),
            AverageKind::Exponential => write!(f, "exponential"),
        }
    }
}

impl FromStr for AverageKind {
    type Err = ConfluenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" | "sma" => Ok(AverageKind::Simple),
            "exponential" | "ema" => Ok(AverageKind::Exponential),
            other => Err(ConfluenceError::invalid(
                "indicators",
                "macd_average",
                format!("unknown average '{other}', expected simple or exponential"),
            )),
        }
    }
}

/// Either kind of moving average behind one interface.
#[derive(Debug, Clone)]
pub enum MovingAverage {
    Simple(Sma),
    Exponential(Ema),
}

impl MovingAverage {
    pub fn new(kind: AverageKind, period: usize) -> Self {
        match kind {
            AverageKind::Simple => MovingAverage::Simple(Sma::new(period)),
            AverageKind::Exponential => MovingAverage::Exponential(Ema::new(period)),
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        match self {
            MovingAverage::Simple(sma) => sma.update(value),
            MovingAverage::Exponential(ema) => ema.update(value),
        }
    }
}

/// Periods for the default indicator feed.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub ma_fast: usize,
    pub ma_slow: usize,
    pub stoch_period: usize,
    pub stoch_smooth_k: usize,
    pub stoch_smooth_d: usize,
    pub mfi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub macd_average: AverageKind,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            ma_fast: 9,
            ma_slow: 20,
            stoch_period: 14,
            stoch_smooth_k: 3,
            stoch_smooth_d: 3,
            mfi_period: 14,
            macd_fast: 3,
            macd_slow: 10,
            macd_signal: 16,
            macd_average: AverageKind::Simple,
        }
    }
}

impl IndicatorParams {
    /// Bars needed before `kind` first has a value.
    pub fn history_needed(&self, kind: IndicatorKind) -> usize {
        match kind {
            IndicatorKind::Ma => self.ma_slow.max(self.ma_fast),
            IndicatorKind::Lbr => self.macd_slow.max(self.macd_fast) + self.macd_signal - 1,
            IndicatorKind::Stoch => {
                2 * self.stoch_period + self.stoch_smooth_k + self.stoch_smooth_d - 2
            }
            IndicatorKind::Mfi => self.mfi_period + 1,
            IndicatorKind::Vol => 2,
        }
    }
}
