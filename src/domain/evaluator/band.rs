//! Single-line band crossing for a bounded oscillator.

use super::{crosses_above, crosses_below};
use crate::domain::signal::SignalEvent;

/// BUY when the value crosses upward through `lower`, SELL when it crosses
/// downward through `upper`.
#[derive(Debug, Clone)]
pub struct BandCrossover {
    lower: f64,
    upper: f64,
    prev: Option<f64>,
}

impl BandCrossover {
    pub fn new(lower: f64, upper: f64) -> Self {
        BandCrossover {
            lower,
            upper,
            prev: None,
        }
    }

    pub fn update(&mut self, value: f64) -> SignalEvent {
        let event = match self.prev {
            Some(prev) if crosses_above(prev, value, self.lower) => SignalEvent::Buy,
            Some(prev) if crosses_below(prev, value, self.upper) => SignalEvent::Sell,
            _ => SignalEvent::None,
        };
        self.prev = Some(value);
        event
    }
}
