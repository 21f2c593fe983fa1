//! Two-line crossover (moving-average pair, MACD line vs. signal).

use crate::domain::signal::SignalEvent;

/// Emits BUY on the bar where `a` moves from `<= b` to `> b`, SELL on the
/// mirror transition. The first update only records the pair.
#[derive(Debug, Clone, Default)]
pub struct PairCrossover {
    prev: Option<(f64, f64)>,
}

impl PairCrossover {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, a: f64, b: f64) -> SignalEvent {
        let event = match self.prev {
            Some((prev_a, prev_b)) if prev_a <= prev_b && a > b => SignalEvent::Buy,
            Some((prev_a, prev_b)) if prev_a >= prev_b && a < b => SignalEvent::Sell,
            _ => SignalEvent::None,
        };
        self.prev = Some((a, b));
        event
    }
}
