//! Market data port.

use crate::domain::error::ConfluenceError;
use crate::domain::instrument::InstrumentId;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `instrument` between `start_date` and `end_date` inclusive,
    /// in ascending time order.
    fn fetch_ohlcv(
        &self,
        instrument: &InstrumentId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ConfluenceError>;

    fn list_instruments(&self) -> Result<Vec<InstrumentId>, ConfluenceError>;
}
