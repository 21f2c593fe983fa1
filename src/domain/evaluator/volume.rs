//! Volume spike detector with separate up-bar and down-bar averages.

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::SignalEvent;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
struct RollingMean {
    values: VecDeque<f64>,
    sum: f64,
    cap: usize,
}

impl RollingMean {
    fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        RollingMean {
            values: VecDeque::with_capacity(cap),
            sum: 0.0,
            cap,
        }
    }

    fn push(&mut self, value: f64) {
        if self.values.len() == self.cap {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.values.push_back(value);
        self.sum += value;
    }

    fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.sum / self.values.len() as f64)
        }
    }
}

/// BUY when volume exceeds `multiplier` times the up-bar average and the
/// close rose against the previous close; SELL when it exceeds the down-bar
/// average and the close fell.
///
/// Bars with `close == open` feed neither average.
#[derive(Debug, Clone)]
pub struct VolumeSpike {
    multiplier: f64,
    up: RollingMean,
    down: RollingMean,
    prev_close: Option<f64>,
}

impl VolumeSpike {
    pub fn new(multiplier: f64, lookback: usize) -> Self {
        VolumeSpike {
            multiplier,
            up: RollingMean::new(lookback),
            down: RollingMean::new(lookback),
            prev_close: None,
        }
    }

    /// Record a bar without evaluating it.
    pub fn observe(&mut self, bar: &OhlcvBar) {
        if bar.is_up() {
            self.up.push(bar.volume);
        } else if bar.is_down() {
            self.down.push(bar.volume);
        }
        self.prev_close = Some(bar.close);
    }

    pub fn update(&mut self, bar: &OhlcvBar) -> SignalEvent {
        let event = match (self.prev_close, self.up.mean(), self.down.mean()) {
            (Some(prev_close), Some(up_avg), Some(down_avg)) => {
                if bar.volume > self.multiplier * up_avg && bar.close > prev_close {
                    SignalEvent::Buy
                } else if bar.volume > self.multiplier * down_avg && bar.close < prev_close {
                    SignalEvent::Sell
                } else {
                    SignalEvent::None
                }
            }
            _ => SignalEvent::None,
        };
        self.observe(bar);
        event
    }
}
