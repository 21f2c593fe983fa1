//! Dual-line stochastic band crossover.
//!
//! Both K and D are checked against the lower and upper bands. A leg fires
//! only if the companion line registered a crossing of its own within the
//! last `lookback` bars (current bar included). When several legs qualify on
//! the same bar the first of D-buy, D-sell, K-buy, K-sell wins.

use super::{crosses_above, crosses_below};
use crate::domain::signal::SignalEvent;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct DualBandCrossover {
    lower: f64,
    upper: f64,
    lookback: usize,
    prev: Option<(f64, f64)>,
    k_crossed: VecDeque<bool>,
    d_crossed: VecDeque<bool>,
}

/// Band crossings of one line on one bar.
#[derive(Debug, Clone, Copy, Default)]
struct Legs {
    buy: bool,
    sell: bool,
}

impl Legs {
    fn registered(self) -> bool {
        self.buy || self.sell
    }
}

fn push_bounded(window: &mut VecDeque<bool>, value: bool, cap: usize) {
    if window.len() == cap {
        window.pop_front();
    }
    window.push_back(value);
}

impl DualBandCrossover {
    pub fn new(lower: f64, upper: f64, lookback: usize) -> Self {
        let lookback = lookback.max(1);
        DualBandCrossover {
            lower,
            upper,
            lookback,
            prev: None,
            k_crossed: VecDeque::with_capacity(lookback),
            d_crossed: VecDeque::with_capacity(lookback),
        }
    }

    fn legs(&self, prev: f64, curr: f64) -> Legs {
        Legs {
            buy: crosses_above(prev, curr, self.lower),
            sell: crosses_below(prev, curr, self.upper),
        }
    }

    pub fn update(&mut self, k: f64, d: f64) -> SignalEvent {
        let (k_legs, d_legs) = match self.prev {
            Some((prev_k, prev_d)) => (self.legs(prev_k, k), self.legs(prev_d, d)),
            None => (Legs::default(), Legs::default()),
        };
        self.prev = Some((k, d));

        push_bounded(&mut self.k_crossed, k_legs.registered(), self.lookback);
        push_bounded(&mut self.d_crossed, d_legs.registered(), self.lookback);

        let k_recent = self.k_crossed.iter().any(|&c| c);
        let d_recent = self.d_crossed.iter().any(|&c| c);

        if d_legs.buy && k_recent {
            SignalEvent::Buy
        } else if d_legs.sell && k_recent {
            SignalEvent::Sell
        } else if k_legs.buy && d_recent {
            SignalEvent::Buy
        } else if k_legs.sell && d_recent {
            SignalEvent::Sell
        } else {
            SignalEvent::None
        }
    }
}
