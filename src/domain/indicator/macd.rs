//! MACD-style oscillator.
//!
//! Line = MA(fast) - MA(slow)
//! Signal = MA(signal) of Line
//!
//! The average kind (simple or exponential) applies to all three. Ready once
//! the slow average and then the signal average are full.

use super::{AverageKind, MacdValue, MovingAverage};

#[derive(Debug, Clone)]
pub struct Macd {
    fast: MovingAverage,
    slow: MovingAverage,
    signal: MovingAverage,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, kind: AverageKind) -> Self {
        Macd {
            fast: MovingAverage::new(kind, fast),
            slow: MovingAverage::new(kind, slow),
            signal: MovingAverage::new(kind, signal),
        }
    }

    pub fn update(&mut self, close: f64) -> Option<MacdValue> {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);
        let line = fast? - slow?;
        let signal = self.signal.update(line)?;
        Some(MacdValue { line, signal })
    }
}
