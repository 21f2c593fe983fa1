//! Trade outcome ledger.
//!
//! Each instrument has at most one open [`TradeRecord`]. Closing it folds the
//! outcome into a [`LedgerBucket`] keyed by the signal combination captured
//! at entry. Buckets are created on first close and never removed.

use crate::domain::error::ConfluenceError;
use crate::domain::instrument::InstrumentId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    /// Signed: positive long, negative short.
    pub quantity: f64,
    pub combo: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum TradeState {
    #[default]
    NoOpenTrade,
    OpenTrade(TradeRecord),
}

/// Result of closing one trade.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub combo: String,
    pub return_pct: f64,
    pub pnl: f64,
    pub duration_hours: f64,
    pub is_trailing_stop: bool,
}

/// Percentage return and PnL of a round trip.
///
/// return = pnl / |entry_price * quantity| * 100, or 0 when the cost basis
/// is 0. Quantity is signed so short trades profit when price falls.
pub fn trade_return(entry_price: f64, exit_price: f64, quantity: f64) -> (f64, f64) {
    let pnl = (exit_price - entry_price) * quantity;
    let basis = (entry_price * quantity).abs();
    let return_pct = if basis == 0.0 { 0.0 } else { pnl / basis * 100.0 };
    (return_pct, pnl)
}

/// Running outcome statistics for one signal combination.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LedgerBucket {
    pub count: usize,
    pub wins: usize,
    pub total_return: f64,
    pub total_pnl: f64,
    pub total_duration_hours: f64,
    pub returns: Vec<f64>,
    pub max_return: Option<f64>,
    pub min_return: Option<f64>,
    pub trailing_stop_exits: usize,
}

impl LedgerBucket {
    pub fn record(&mut self, outcome: &TradeOutcome) {
        let r = outcome.return_pct;
        self.count += 1;
        if r > 0.0 {
            self.wins += 1;
        }
        self.total_return += r;
        self.total_pnl += outcome.pnl;
        self.total_duration_hours += outcome.duration_hours;
        self.returns.push(r);
        self.max_return = Some(self.max_return.map_or(r, |m| m.max(r)));
        self.min_return = Some(self.min_return.map_or(r, |m| m.min(r)));
        if outcome.is_trailing_stop {
            self.trailing_stop_exits += 1;
        }
    }

    /// Percent of trades with a positive return.
    pub fn win_rate(&self) -> f64 {
        ratio(self.wins as f64, self.count) * 100.0
    }

    pub fn mean_return(&self) -> f64 {
        ratio(self.total_return, self.count)
    }

    pub fn mean_duration_hours(&self) -> f64 {
        ratio(self.total_duration_hours, self.count)
    }

    /// Population standard deviation of the returns.
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mean = self.mean_return();
        let variance = self
            .returns
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / self.count as f64;
        variance.sqrt()
    }

    /// Percent of trades closed by a trailing stop.
    pub fn trailing_stop_exit_rate(&self) -> f64 {
        ratio(self.trailing_stop_exits as f64, self.count) * 100.0
    }
}

fn ratio(numerator: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        numerator / count as f64
    }
}

#[derive(Debug, Clone, Default)]
struct InstrumentLedger {
    state: TradeState,
    buckets: BTreeMap<String, LedgerBucket>,
}

/// Open trades and closed-trade buckets for every configured instrument.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    instruments: BTreeMap<InstrumentId, InstrumentLedger>,
}

impl Ledger {
    pub fn new(instruments: &[InstrumentId]) -> Self {
        Ledger {
            instruments: instruments
                .iter()
                .map(|id| (id.clone(), InstrumentLedger::default()))
                .collect(),
        }
    }

    fn entry_mut(&mut self, instrument: &InstrumentId) -> Result<&mut InstrumentLedger, ConfluenceError> {
        self.instruments
            .get_mut(instrument)
            .ok_or_else(|| ConfluenceError::UnknownInstrument(instrument.to_string()))
    }

    /// Open a trade if none is open. Returns whether a record was opened.
    pub fn on_entry(
        &mut self,
        instrument: &InstrumentId,
        time: NaiveDateTime,
        price: f64,
        quantity: f64,
        combo: &str,
    ) -> Result<bool, ConfluenceError> {
        let entry = self.entry_mut(instrument)?;
        if let TradeState::OpenTrade(_) = entry.state {
            return Ok(false);
        }
        entry.state = TradeState::OpenTrade(TradeRecord {
            entry_time: time,
            entry_price: price,
            quantity,
            combo: combo.to_string(),
        });
        Ok(true)
    }

    /// Grow the open trade after a scale-in fill of `added` (signed) shares.
    ///
    /// With `replace` the old record is dropped and a new one covering the
    /// whole position starts at the fill; otherwise the record keeps its entry
    /// time and combo and moves to the quantity-weighted average price.
    pub fn on_scale_in(
        &mut self,
        instrument: &InstrumentId,
        time: NaiveDateTime,
        price: f64,
        added: f64,
        replace: bool,
    ) -> Result<(), ConfluenceError> {
        let entry = self.entry_mut(instrument)?;
        if let TradeState::OpenTrade(record) = &mut entry.state {
            let total = record.quantity + added;
            if replace {
                record.entry_time = time;
                record.entry_price = price;
            } else if total != 0.0 {
                record.entry_price =
                    (record.entry_price * record.quantity + price * added) / total;
            }
            record.quantity = total;
        }
        Ok(())
    }

    /// Close the open trade, if any, and fold it into its bucket.
    pub fn on_exit(
        &mut self,
        instrument: &InstrumentId,
        time: NaiveDateTime,
        price: f64,
        quantity: f64,
        is_trailing_stop: bool,
    ) -> Result<Option<TradeOutcome>, ConfluenceError> {
        let entry = self.entry_mut(instrument)?;
        let record = match std::mem::take(&mut entry.state) {
            TradeState::OpenTrade(record) => record,
            TradeState::NoOpenTrade => return Ok(None),
        };

        if (quantity.abs() - record.quantity.abs()).abs() > 1e-9 {
            warn!(
                instrument = %instrument,
                open = record.quantity,
                closed = quantity,
                "exit quantity differs from open trade; using open quantity"
            );
        }

        let (return_pct, pnl) = trade_return(record.entry_price, price, record.quantity);
        let duration_hours = (time - record.entry_time).num_seconds() as f64 / 3600.0;
        let combo = if record.combo.is_empty() {
            crate::domain::aggregator::NO_SIGNAL.to_string()
        } else {
            record.combo
        };
        let outcome = TradeOutcome {
            combo,
            return_pct,
            pnl,
            duration_hours,
            is_trailing_stop,
        };
        entry
            .buckets
            .entry(outcome.combo.clone())
            .or_default()
            .record(&outcome);
        Ok(Some(outcome))
    }

    pub fn open_trade(&self, instrument: &InstrumentId) -> Option<&TradeRecord> {
        match self.instruments.get(instrument).map(|l| &l.state) {
            Some(TradeState::OpenTrade(record)) => Some(record),
            _ => None,
        }
    }

    /// Buckets for one instrument, keyed by combo label.
    pub fn buckets(&self, instrument: &InstrumentId) -> Option<&BTreeMap<String, LedgerBucket>> {
        self.instruments.get(instrument).map(|l| &l.buckets)
    }

    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentId> {
        self.instruments.keys()
    }
}
