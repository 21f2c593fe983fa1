//! Per-instrument indicator evaluators.
//!
//! Each evaluator turns a stream of indicator values into one
//! [`SignalEvent`] per bar. Only a crossing between the previous and the
//! current value emits; a value that merely sits above or below a level
//! emits nothing.
//!
//! - [`crossover::PairCrossover`]: fast/slow MA and MACD line/signal
//! - [`stochastic::DualBandCrossover`]: stochastic K and D against 20/80 bands
//! - [`band::BandCrossover`]: single bounded oscillator (money flow)
//! - [`volume::VolumeSpike`]: up/down volume averages

pub mod band;
pub mod crossover;
pub mod stochastic;
pub mod volume;

use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::{IndicatorKind, SignalEvent};
use std::collections::BTreeSet;

use band::BandCrossover;
use crossover::PairCrossover;
use stochastic::DualBandCrossover;
use volume::VolumeSpike;

/// `prev <= level && curr > level`
pub fn crosses_above(prev: f64, curr: f64, level: f64) -> bool {
    prev <= level && curr > level
}

/// `prev >= level && curr < level`
pub fn crosses_below(prev: f64, curr: f64, level: f64) -> bool {
    prev >= level && curr < level
}

/// Thresholds and window lengths used by the evaluators.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorParams {
    pub stoch_lower: f64,
    pub stoch_upper: f64,
    pub stoch_lookback: usize,
    pub mfi_lower: f64,
    pub mfi_upper: f64,
    pub volume_multiplier: f64,
    pub volume_lookback: usize,
}

impl Default for EvaluatorParams {
    fn default() -> Self {
        EvaluatorParams {
            stoch_lower: 20.0,
            stoch_upper: 80.0,
            stoch_lookback: 3,
            mfi_lower: 20.0,
            mfi_upper: 80.0,
            volume_multiplier: 2.0,
            volume_lookback: 35,
        }
    }
}

/// The enabled evaluators for one instrument.
#[derive(Debug, Clone)]
pub struct EvaluatorSet {
    lbr: Option<PairCrossover>,
    ma: Option<PairCrossover>,
    mfi: Option<BandCrossover>,
    stoch: Option<DualBandCrossover>,
    vol: Option<VolumeSpike>,
}

impl EvaluatorSet {
    pub fn new(enabled: &BTreeSet<IndicatorKind>, params: &EvaluatorParams) -> Self {
        let on = |kind| enabled.contains(&kind);
        EvaluatorSet {
            lbr: on(IndicatorKind::Lbr).then(PairCrossover::new),
            ma: on(IndicatorKind::Ma).then(PairCrossover::new),
            mfi: on(IndicatorKind::Mfi)
                .then(|| BandCrossover::new(params.mfi_lower, params.mfi_upper)),
            stoch: on(IndicatorKind::Stoch).then(|| {
                DualBandCrossover::new(
                    params.stoch_lower,
                    params.stoch_upper,
                    params.stoch_lookback,
                )
            }),
            vol: on(IndicatorKind::Vol)
                .then(|| VolumeSpike::new(params.volume_multiplier, params.volume_lookback)),
        }
    }

    /// True when every enabled evaluator that depends on an external
    /// indicator has a value in `snapshot`.
    pub fn is_ready(&self, snapshot: &IndicatorSnapshot) -> bool {
        (self.lbr.is_none() || snapshot.macd.is_some())
            && (self.ma.is_none() || snapshot.ma.is_some())
            && (self.mfi.is_none() || snapshot.mfi.is_some())
            && (self.stoch.is_none() || snapshot.stoch.is_some())
    }

    /// Evaluate every enabled indicator for `bar`, in [`IndicatorKind`]
    /// order.
    ///
    /// Returns `None` without touching the crossing state when the snapshot
    /// is not ready. The volume evaluator still records the bar in that case
    /// since it needs no external indicator.
    pub fn evaluate(
        &mut self,
        bar: &OhlcvBar,
        snapshot: &IndicatorSnapshot,
    ) -> Option<Vec<(IndicatorKind, SignalEvent)>> {
        if !self.is_ready(snapshot) {
            if let Some(vol) = self.vol.as_mut() {
                vol.observe(bar);
            }
            return None;
        }

        let mut events = Vec::with_capacity(IndicatorKind::ALL.len());
        if let (Some(eval), Some(macd)) = (self.lbr.as_mut(), snapshot.macd) {
            events.push((IndicatorKind::Lbr, eval.update(macd.line, macd.signal)));
        }
        if let (Some(eval), Some(ma)) = (self.ma.as_mut(), snapshot.ma) {
            events.push((IndicatorKind::Ma, eval.update(ma.fast, ma.slow)));
        }
        if let (Some(eval), Some(mfi)) = (self.mfi.as_mut(), snapshot.mfi) {
            events.push((IndicatorKind::Mfi, eval.update(mfi)));
        }
        if let (Some(eval), Some(stoch)) = (self.stoch.as_mut(), snapshot.stoch) {
            events.push((IndicatorKind::Stoch, eval.update(stoch.k, stoch.d)));
        }
        if let Some(eval) = self.vol.as_mut() {
            events.push((IndicatorKind::Vol, eval.update(bar)));
        }
        Some(events)
    }
}
