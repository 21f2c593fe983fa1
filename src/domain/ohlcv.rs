//! OHLCV bar representation.

use crate::domain::instrument::InstrumentId;
use chrono::NaiveDateTime;

#[derive(Debug, Clone)]
pub struct OhlcvBar {
    pub instrument: InstrumentId,
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn is_up(&self) -> bool {
        self.close > self.open
    }

    pub fn is_down(&self) -> bool {
        self.close < self.open
    }
}
