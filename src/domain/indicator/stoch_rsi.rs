//! Stochastic RSI.
//!
//! raw = (RSI - min(RSI, n)) / (max(RSI, n) - min(RSI, n)) * 100, 0 when
//! the range is 0. K = SMA(smooth_k) of raw, D = SMA(smooth_d) of K.

use super::{Rsi, Sma, StochValue};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct StochRsi {
    rsi: Rsi,
    stoch_period: usize,
    rsi_values: VecDeque<f64>,
    k: Sma,
    d: Sma,
}

impl StochRsi {
    pub fn new(rsi_period: usize, stoch_period: usize, smooth_k: usize, smooth_d: usize) -> Self {
        let stoch_period = stoch_period.max(1);
        StochRsi {
            rsi: Rsi::new(rsi_period),
            stoch_period,
            rsi_values: VecDeque::with_capacity(stoch_period),
            k: Sma::new(smooth_k),
            d: Sma::new(smooth_d),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<StochValue> {
        let rsi = self.rsi.update(close)?;
        if self.rsi_values.len() == self.stoch_period {
            self.rsi_values.pop_front();
        }
        self.rsi_values.push_back(rsi);
        if self.rsi_values.len() < self.stoch_period {
            return None;
        }

        let (lo, hi) = self
            .rsi_values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let raw = if hi > lo {
            (rsi - lo) / (hi - lo) * 100.0
        } else {
            0.0
        };

        let k = self.k.update(raw)?;
        let d = self.d.update(k)?;
        Some(StochValue { k, d })
    }
}
