//! End-of-run reporting: per-combination outcome statistics, per-indicator
//! signal counts and the paper equity summary.

use crate::domain::instrument::InstrumentId;
use crate::domain::ledger::{Ledger, LedgerBucket};
use crate::domain::signal::{IndicatorKind, SignalEvent};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;

/// BUY/SELL events emitted by one indicator over the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SignalCounts {
    pub buy: usize,
    pub sell: usize,
}

impl SignalCounts {
    pub fn record(&mut self, event: SignalEvent) {
        match event {
            SignalEvent::Buy => self.buy += 1,
            SignalEvent::Sell => self.sell += 1,
            SignalEvent::None => {}
        }
    }
}

/// One row of the report: a ledger bucket with its derived statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComboReport {
    pub instrument: InstrumentId,
    pub combo: String,
    pub count: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub avg_return: f64,
    pub total_pnl: f64,
    pub avg_duration_hours: f64,
    pub max_return: f64,
    pub min_return: f64,
    pub std_dev: f64,
    pub trailing_stop_exits: usize,
    pub trailing_stop_exit_rate: f64,
}

impl ComboReport {
    pub fn from_bucket(instrument: &InstrumentId, combo: &str, bucket: &LedgerBucket) -> Self {
        ComboReport {
            instrument: instrument.clone(),
            combo: combo.to_string(),
            count: bucket.count,
            wins: bucket.wins,
            win_rate: bucket.win_rate(),
            avg_return: bucket.mean_return(),
            total_pnl: bucket.total_pnl,
            avg_duration_hours: bucket.mean_duration_hours(),
            max_return: bucket.max_return.unwrap_or(0.0),
            min_return: bucket.min_return.unwrap_or(0.0),
            std_dev: bucket.std_dev(),
            trailing_stop_exits: bucket.trailing_stop_exits,
            trailing_stop_exit_rate: bucket.trailing_stop_exit_rate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentReport {
    pub instrument: InstrumentId,
    /// Keyed by indicator name (`MA`, `STOCH`, ...).
    pub signal_counts: BTreeMap<String, SignalCounts>,
    pub combos: Vec<ComboReport>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RunReport {
    pub instruments: Vec<InstrumentReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity: Option<EquitySummary>,
}

impl RunReport {
    pub fn build(
        ledger: &Ledger,
        counts: &BTreeMap<InstrumentId, BTreeMap<IndicatorKind, SignalCounts>>,
    ) -> Self {
        let instruments = ledger
            .instruments()
            .map(|id| {
                let combos = ledger
                    .buckets(id)
                    .map(|buckets| {
                        buckets
                            .iter()
                            .map(|(combo, bucket)| ComboReport::from_bucket(id, combo, bucket))
                            .collect()
                    })
                    .unwrap_or_default();
                let signal_counts = counts
                    .get(id)
                    .map(|per_kind| {
                        per_kind
                            .iter()
                            .map(|(kind, c)| (kind.name().to_string(), *c))
                            .collect()
                    })
                    .unwrap_or_default();
                InstrumentReport {
                    instrument: id.clone(),
                    signal_counts,
                    combos,
                }
            })
            .collect();
        RunReport {
            instruments,
            equity: None,
        }
    }

    /// Every combo row, instrument by instrument.
    pub fn combos(&self) -> impl Iterator<Item = &ComboReport> {
        self.instruments.iter().flat_map(|i| i.combos.iter())
    }

    pub fn total_trades(&self) -> usize {
        self.combos().map(|c| c.count).sum()
    }

    pub fn total_pnl(&self) -> f64 {
        self.combos().map(|c| c.total_pnl).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub time: NaiveDateTime,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquitySummary {
    pub initial_capital: f64,
    pub final_equity: f64,
    /// Fraction, not percent.
    pub total_return: f64,
    pub max_drawdown: f64,
    /// In bars.
    pub max_drawdown_duration: usize,
}

impl EquitySummary {
    pub fn compute(initial_capital: f64, equity_curve: &[EquityPoint]) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        EquitySummary {
            initial_capital,
            final_equity,
            total_return,
            max_drawdown,
            max_drawdown_duration,
        }
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}
