//! Money Flow Index.
//!
//! money flow = typical price * volume, classed positive when the typical
//! price rose against the previous bar and negative when it fell.
//! MFI = 100 - 100 / (1 + sum(positive, n) / sum(negative, n)), 100 when the
//! negative sum is 0.

use crate::domain::ohlcv::OhlcvBar;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Mfi {
    period: usize,
    prev_typical: Option<f64>,
    flows: VecDeque<(f64, f64)>,
}

impl Mfi {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Mfi {
            period,
            prev_typical: None,
            flows: VecDeque::with_capacity(period),
        }
    }

    pub fn update(&mut self, bar: &OhlcvBar) -> Option<f64> {
        let typical = bar.typical_price();
        let prev = self.prev_typical.replace(typical)?;
        let flow = typical * bar.volume;
        let entry = if typical > prev {
            (flow, 0.0)
        } else if typical < prev {
            (0.0, flow)
        } else {
            (0.0, 0.0)
        };

        if self.flows.len() == self.period {
            self.flows.pop_front();
        }
        self.flows.push_back(entry);
        if self.flows.len() < self.period {
            return None;
        }

        let (pos, neg) = self
            .flows
            .iter()
            .fold((0.0, 0.0), |(p, n), &(up, down)| (p + up, n + down));
        Some(if neg == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + pos / neg)
        })
    }
}
