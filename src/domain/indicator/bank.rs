//! Per-instrument indicator sets behind the [`IndicatorFeed`] port.

use super::{IndicatorParams, IndicatorSnapshot, MaValue, Macd, Mfi, Sma, StochRsi};
use crate::domain::error::ConfluenceError;
use crate::domain::instrument::InstrumentId;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::indicator_port::IndicatorFeed;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct IndicatorSet {
    ma_fast: Sma,
    ma_slow: Sma,
    macd: Macd,
    stoch: StochRsi,
    mfi: Mfi,
}

impl IndicatorSet {
    fn new(params: &IndicatorParams) -> Self {
        IndicatorSet {
            ma_fast: Sma::new(params.ma_fast),
            ma_slow: Sma::new(params.ma_slow),
            macd: Macd::new(
                params.macd_fast,
                params.macd_slow,
                params.macd_signal,
                params.macd_average,
            ),
            stoch: StochRsi::new(
                params.stoch_period,
                params.stoch_period,
                params.stoch_smooth_k,
                params.stoch_smooth_d,
            ),
            mfi: Mfi::new(params.mfi_period),
        }
    }

    fn update(&mut self, bar: &OhlcvBar) -> IndicatorSnapshot {
        let fast = self.ma_fast.update(bar.close);
        let slow = self.ma_slow.update(bar.close);
        IndicatorSnapshot {
            ma: fast.zip(slow).map(|(fast, slow)| MaValue { fast, slow }),
            macd: self.macd.update(bar.close),
            stoch: self.stoch.update(bar.close),
            mfi: self.mfi.update(bar),
        }
    }
}

/// The default indicator feed: SMA pair, MACD, stochastic RSI and MFI for
/// every configured instrument.
#[derive(Debug, Clone)]
pub struct IndicatorBank {
    sets: BTreeMap<InstrumentId, IndicatorSet>,
}

impl IndicatorBank {
    pub fn new(instruments: &[InstrumentId], params: &IndicatorParams) -> Self {
        let sets = instruments
            .iter()
            .map(|id| (id.clone(), IndicatorSet::new(params)))
            .collect();
        IndicatorBank { sets }
    }
}

impl IndicatorFeed for IndicatorBank {
    fn update(&mut self, bar: &OhlcvBar) -> Result<IndicatorSnapshot, ConfluenceError> {
        let set = self
            .sets
            .get_mut(&bar.instrument)
            .ok_or_else(|| ConfluenceError::UnknownInstrument(bar.instrument.to_string()))?;
        Ok(set.update(bar))
    }
}
