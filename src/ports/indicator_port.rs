//! Indicator feed port.

use crate::domain::error::ConfluenceError;
use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::ohlcv::OhlcvBar;

/// Supplies indicator values for each new bar.
///
/// Implementations keep their own per-instrument history and report a
/// component as `None` until it has enough bars to be trusted.
pub trait IndicatorFeed {
    fn update(&mut self, bar: &OhlcvBar) -> Result<IndicatorSnapshot, ConfluenceError>;
}
