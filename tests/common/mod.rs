#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use confluence::adapters::file_config_adapter::FileConfigAdapter;
use confluence::domain::config::StrategyConfig;
use confluence::domain::error::ConfluenceError;
use confluence::domain::indicator::{IndicatorSnapshot, MaValue};
pub use confluence::domain::instrument::InstrumentId;
pub use confluence::domain::ohlcv::OhlcvBar;
use confluence::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<InstrumentId, Vec<OhlcvBar>>,
    pub errors: HashMap<InstrumentId, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, instrument: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(InstrumentId::new(instrument), bars);
        self
    }

    pub fn with_error(mut self, instrument: &str, reason: &str) -> Self {
        self.errors
            .insert(InstrumentId::new(instrument), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        instrument: &InstrumentId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ConfluenceError> {
        if let Some(reason) = self.errors.get(instrument) {
            return Err(ConfluenceError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(instrument)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.time.date() >= start_date && b.time.date() <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_instruments(&self) -> Result<Vec<InstrumentId>, ConfluenceError> {
        let mut ids: Vec<_> = self.data.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Midnight of 2024-01-01 plus `index` days.
pub fn day(index: usize) -> NaiveDateTime {
    date(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap() + chrono::Duration::days(index as i64)
}

pub fn make_bar(instrument: &str, index: usize, close: f64) -> OhlcvBar {
    OhlcvBar {
        instrument: InstrumentId::new(instrument),
        time: day(index),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000.0,
    }
}

/// One daily bar per close, starting 2024-01-01.
pub fn bars_from_closes(instrument: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(instrument, i, close))
        .collect()
}

/// Triangle wave around `mid`: rises `amplitude` over `half_period` bars,
/// then falls back, repeatedly.
pub fn generate_bars(
    instrument: &str,
    count: usize,
    mid: f64,
    amplitude: f64,
    half_period: usize,
) -> Vec<OhlcvBar> {
    let step = amplitude / half_period as f64;
    let closes: Vec<f64> = (0..count)
        .map(|i| {
            let phase = i % (2 * half_period);
            let offset = if phase < half_period {
                phase as f64 * step
            } else {
                (2 * half_period - phase) as f64 * step
            };
            mid - amplitude / 2.0 + offset
        })
        .collect();
    bars_from_closes(instrument, &closes)
}

pub fn ma(fast: f64, slow: f64) -> IndicatorSnapshot {
    IndicatorSnapshot {
        ma: Some(MaValue { fast, slow }),
        ..Default::default()
    }
}

/// MA-only strategy on fast 3 / slow 5 averages, every crossing acts.
pub const MA_ONLY_INI: &str = r#"
[backtest]
start_date = 2024-01-01
end_date = 2024-12-31
instruments = BHP

[signals]
trigger_window = 1
mode = count
enabled = MA
entry_threshold = 1
exit_threshold = 1

[indicators]
ma_fast = 3
ma_slow = 5
"#;

pub fn config_from(ini: &str) -> StrategyConfig {
    StrategyConfig::load(&FileConfigAdapter::from_string(ini).unwrap()).unwrap()
}

pub fn sample_config() -> StrategyConfig {
    config_from(MA_ONLY_INI)
}
