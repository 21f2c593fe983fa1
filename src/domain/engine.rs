//! Signal aggregation and position decision engine.
//!
//! One [`SignalEngine`] owns the state of every configured instrument. Per
//! bar, [`SignalEngine::on_bar`] runs the evaluators, pushes their events
//! into the trigger windows, aggregates a net score and asks the policy for
//! an action. Fills reported back through [`SignalEngine::on_fill`] drive
//! the position state and the trade ledger; an instruction on its own
//! changes neither.

use crate::domain::aggregator::{aggregate, AggregationConfig, NetSignal};
use crate::domain::error::ConfluenceError;
use crate::domain::evaluator::{EvaluatorParams, EvaluatorSet};
use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::instrument::InstrumentId;
use crate::domain::ledger::Ledger;
use crate::domain::metrics::{RunReport, SignalCounts};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::policy::{
    decide, Action, Instruction, PolicyConfig, PositionSide, ScaleInTrade, TrailingStopRequest,
};
use crate::domain::signal::{IndicatorKind, SignalEvent, SignalTag};
use crate::domain::signal_window::SignalWindow;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{debug, info, trace};

const QUANTITY_EPSILON: f64 = 1e-9;

/// Immutable engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub aggregation: AggregationConfig,
    pub evaluators: EvaluatorParams,
    pub policy: PolicyConfig,
    pub trigger_window: usize,
    pub warmup_bars: usize,
}

/// Per-bar trace record: what the aggregator saw and what the policy chose.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalTrace {
    pub instrument: InstrumentId,
    pub bar_index: usize,
    pub time: NaiveDateTime,
    pub score: f64,
    pub active: Vec<SignalTag>,
    pub action: Action,
}

impl SignalTrace {
    pub fn active_tags(&self) -> String {
        self.active
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BarOutcome {
    /// An enabled indicator has no value yet; nothing was evaluated.
    NotReady,
    /// Evaluators and windows updated, no decision taken.
    WarmingUp,
    Evaluated {
        trace: SignalTrace,
        instruction: Option<Instruction>,
    },
}

impl BarOutcome {
    pub fn instruction(&self) -> Option<&Instruction> {
        match self {
            BarOutcome::Evaluated { instruction, .. } => instruction.as_ref(),
            _ => None,
        }
    }
}

/// Fill notification from the execution collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub instrument: InstrumentId,
    pub time: NaiveDateTime,
    pub price: f64,
    /// Signed change in position: positive bought, negative sold.
    pub quantity: f64,
    pub is_trailing_stop: bool,
}

#[derive(Debug, Clone)]
struct PendingTarget {
    target_weight: f64,
    combo: String,
    arms_trailing_stop: bool,
}

#[derive(Debug, Clone)]
struct InstrumentState {
    evaluators: EvaluatorSet,
    windows: BTreeMap<IndicatorKind, SignalWindow>,
    signal_counts: BTreeMap<IndicatorKind, SignalCounts>,
    quantity: f64,
    weight: f64,
    pending: Option<PendingTarget>,
    trailing_stop_active: bool,
    bars_seen: usize,
}

impl InstrumentState {
    fn new(config: &EngineConfig) -> Self {
        let enabled = &config.aggregation.enabled;
        InstrumentState {
            evaluators: EvaluatorSet::new(enabled, &config.evaluators),
            windows: enabled
                .iter()
                .map(|&kind| (kind, SignalWindow::new(config.trigger_window)))
                .collect(),
            signal_counts: enabled
                .iter()
                .map(|&kind| (kind, SignalCounts::default()))
                .collect(),
            quantity: 0.0,
            weight: 0.0,
            pending: None,
            trailing_stop_active: false,
            bars_seen: 0,
        }
    }

    fn side(&self) -> PositionSide {
        PositionSide::from_quantity(self.quantity)
    }

    fn record_events(&mut self, events: &[(IndicatorKind, SignalEvent)]) {
        for &(kind, event) in events {
            if let Some(window) = self.windows.get_mut(&kind) {
                window.push(event);
            }
            if let Some(counts) = self.signal_counts.get_mut(&kind) {
                counts.record(event);
            }
        }
    }
}

pub struct SignalEngine {
    config: EngineConfig,
    states: BTreeMap<InstrumentId, InstrumentState>,
    ledger: Ledger,
}

impl SignalEngine {
    pub fn new(instruments: &[InstrumentId], config: EngineConfig) -> Self {
        let states = instruments
            .iter()
            .map(|id| (id.clone(), InstrumentState::new(&config)))
            .collect();
        SignalEngine {
            ledger: Ledger::new(instruments),
            states,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn state_mut(&mut self, instrument: &InstrumentId) -> Result<&mut InstrumentState, ConfluenceError> {
        self.states
            .get_mut(instrument)
            .ok_or_else(|| ConfluenceError::UnknownInstrument(instrument.to_string()))
    }

    /// Process one bar for `bar.instrument`.
    pub fn on_bar(
        &mut self,
        bar: &OhlcvBar,
        snapshot: &IndicatorSnapshot,
    ) -> Result<BarOutcome, ConfluenceError> {
        let config = &self.config;
        let state = self
            .states
            .get_mut(&bar.instrument)
            .ok_or_else(|| ConfluenceError::UnknownInstrument(bar.instrument.to_string()))?;
        let bar_index = state.bars_seen;
        state.bars_seen += 1;

        let Some(events) = state.evaluators.evaluate(bar, snapshot) else {
            trace!(instrument = %bar.instrument, bar_index, "indicators not ready, skipping bar");
            return Ok(BarOutcome::NotReady);
        };
        state.record_events(&events);

        if bar_index < config.warmup_bars {
            trace!(instrument = %bar.instrument, bar_index, "warming up");
            return Ok(BarOutcome::WarmingUp);
        }

        let net = aggregate(&config.aggregation, &state.windows);
        let action = decide(
            &config.policy,
            config.aggregation.thresholds(),
            state.side(),
            state.weight,
            net.score,
        );

        let trace = SignalTrace {
            instrument: bar.instrument.clone(),
            bar_index,
            time: bar.time,
            score: net.score,
            active: net.active.clone(),
            action,
        };
        debug!(
            instrument = %trace.instrument,
            bar_index,
            score = trace.score,
            active = %trace.active_tags(),
            action = %action,
            "signal trace"
        );

        let instruction = instruction_for(config, state, bar, bar_index, action, &net);
        Ok(BarOutcome::Evaluated { trace, instruction })
    }

    /// Apply a fill: move the position and open, grow or close the ledger
    /// record accordingly.
    pub fn on_fill(&mut self, fill: &Fill) -> Result<(), ConfluenceError> {
        let replace = self.config.policy.scale_in_trade == ScaleInTrade::Replace;
        let state = self.state_mut(&fill.instrument)?;

        let before = state.quantity;
        let mut after = before + fill.quantity;
        if after.abs() < QUANTITY_EPSILON {
            after = 0.0;
        }
        let combo = state
            .pending
            .as_ref()
            .map(|p| p.combo.clone())
            .unwrap_or_default();
        let side_before = PositionSide::from_quantity(before);
        let side_after = PositionSide::from_quantity(after);

        state.quantity = after;
        if side_after == PositionSide::Flat {
            state.weight = 0.0;
            state.trailing_stop_active = false;
            if fill.is_trailing_stop {
                state.pending = None;
            }
        }
        if let Some(pending) = &state.pending {
            // the stop is armed once the requested exposure exists
            if pending.arms_trailing_stop && side_after != PositionSide::Flat {
                state.trailing_stop_active = true;
            }
            if PositionSide::from_quantity(pending.target_weight) == side_after {
                state.weight = pending.target_weight.abs();
                state.pending = None;
            }
        }

        let id = &fill.instrument;
        match (side_before, side_after) {
            (PositionSide::Flat, PositionSide::Flat) => {}
            (PositionSide::Flat, _) => {
                self.ledger.on_entry(id, fill.time, fill.price, after, &combo)?;
            }
            (_, PositionSide::Flat) => {
                self.close_trade(fill, before)?;
            }
            (b, a) if b != a => {
                self.close_trade(fill, before)?;
                self.ledger.on_entry(id, fill.time, fill.price, after, &combo)?;
            }
            _ if after.abs() > before.abs() => {
                self.ledger
                    .on_scale_in(id, fill.time, fill.price, fill.quantity, replace)?;
            }
            _ => {
                debug!(instrument = %id, before, after, "position reduced without closing");
            }
        }
        Ok(())
    }

    fn close_trade(&mut self, fill: &Fill, closed_quantity: f64) -> Result<(), ConfluenceError> {
        let outcome = self.ledger.on_exit(
            &fill.instrument,
            fill.time,
            fill.price,
            closed_quantity,
            fill.is_trailing_stop,
        )?;
        if let Some(outcome) = outcome {
            info!(
                instrument = %fill.instrument,
                combo = %outcome.combo,
                return_pct = outcome.return_pct,
                pnl = outcome.pnl,
                trailing_stop = outcome.is_trailing_stop,
                "trade closed"
            );
        }
        Ok(())
    }

    /// Signed position quantity as known from fills.
    pub fn position(&self, instrument: &InstrumentId) -> Option<f64> {
        self.states.get(instrument).map(|s| s.quantity)
    }

    /// Absolute weight of the current position.
    pub fn weight(&self, instrument: &InstrumentId) -> Option<f64> {
        self.states.get(instrument).map(|s| s.weight)
    }

    pub fn trailing_stop_active(&self, instrument: &InstrumentId) -> bool {
        self.states
            .get(instrument)
            .is_some_and(|s| s.trailing_stop_active)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// End-of-run report over every instrument.
    pub fn report(&self) -> RunReport {
        let counts = self
            .states
            .iter()
            .map(|(id, s)| (id.clone(), s.signal_counts.clone()))
            .collect();
        RunReport::build(&self.ledger, &counts)
    }
}

fn instruction_for(
    config: &EngineConfig,
    state: &mut InstrumentState,
    bar: &OhlcvBar,
    bar_index: usize,
    action: Action,
    net: &NetSignal,
) -> Option<Instruction> {
    let target_weight = action.target_weight()?;

    let combo = match action {
        Action::Enter { side, .. } | Action::ScaleIn { side, .. } | Action::Flip { side, .. } => {
            net.combo_for(side.direction())
        }
        _ => net.combo_key(),
    };

    let cancel_trailing_stop = state.trailing_stop_active;
    let arm_trailing_stop = if action.opens_exposure() {
        config
            .policy
            .trailing_stop_pct
            .map(|trail_pct| TrailingStopRequest { trail_pct })
    } else {
        None
    };
    if cancel_trailing_stop {
        info!(instrument = %bar.instrument, bar_index, "cancel trailing stop");
    }
    if let Some(req) = arm_trailing_stop {
        info!(instrument = %bar.instrument, bar_index, trail_pct = req.trail_pct, "request trailing stop");
    }
    if cancel_trailing_stop {
        state.trailing_stop_active = false;
    }

    info!(
        instrument = %bar.instrument,
        bar_index,
        action = %action,
        target_weight,
        combo = %combo,
        "instruction"
    );

    state.pending = Some(PendingTarget {
        target_weight,
        combo: combo.clone(),
        arms_trailing_stop: arm_trailing_stop.is_some(),
    });

    Some(Instruction {
        instrument: bar.instrument.clone(),
        bar_index,
        time: bar.time,
        action,
        target_weight,
        combo,
        cancel_trailing_stop,
        arm_trailing_stop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregator::AggregationMode;
    use crate::domain::indicator::MaValue;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn id() -> InstrumentId {
        InstrumentId::new("AAPL")
    }

    fn make_bar(index: usize, close: f64) -> OhlcvBar {
        OhlcvBar {
            instrument: id(),
            time: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                + chrono::Duration::days(index as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    fn ma(fast: f64, slow: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            ma: Some(MaValue { fast, slow }),
            ..Default::default()
        }
    }

    fn ma_only_config() -> EngineConfig {
        EngineConfig {
            aggregation: AggregationConfig {
                enabled: BTreeSet::from([IndicatorKind::Ma]),
                weights: BTreeMap::new(),
                mode: AggregationMode::Count,
                entry_threshold: 1.0,
                exit_threshold: 1.0,
            },
            evaluators: EvaluatorParams::default(),
            policy: PolicyConfig {
                first_trade_allocation: 0.5,
                flip_on_reversal: false,
                ..Default::default()
            },
            trigger_window: 1,
            warmup_bars: 0,
        }
    }

    fn fill(index: usize, price: f64, quantity: f64) -> Fill {
        Fill {
            instrument: id(),
            time: make_bar(index, price).time,
            price,
            quantity,
            is_trailing_stop: false,
        }
    }

    #[test]
    fn unknown_instrument_is_rejected() {
        let mut engine = SignalEngine::new(&[id()], ma_only_config());
        let mut bar = make_bar(0, 10.0);
        bar.instrument = InstrumentId::new("MSFT");
        let err = engine.on_bar(&bar, &ma(1.0, 2.0)).unwrap_err();
        assert!(matches!(err, ConfluenceError::UnknownInstrument(_)));
    }

    #[test]
    fn not_ready_snapshot_is_skipped() {
        let mut engine = SignalEngine::new(&[id()], ma_only_config());
        let outcome = engine
            .on_bar(&make_bar(0, 10.0), &IndicatorSnapshot::default())
            .unwrap();
        assert_eq!(outcome, BarOutcome::NotReady);
    }

    #[test]
    fn ma_cross_enters_with_combo() {
        let mut engine = SignalEngine::new(&[id()], ma_only_config());
        engine.on_bar(&make_bar(0, 10.0), &ma(1.0, 2.0)).unwrap();
        let outcome = engine.on_bar(&make_bar(1, 10.0), &ma(3.0, 2.0)).unwrap();
        let instruction = outcome.instruction().unwrap();
        assert_eq!(
            instruction.action,
            Action::Enter {
                side: PositionSide::Long,
                weight: 0.5
            }
        );
        assert_eq!(instruction.combo, "MA:BUY");
        assert_eq!(instruction.bar_index, 1);
        assert!(!instruction.cancel_trailing_stop);
        assert!(instruction.arm_trailing_stop.is_none());
    }

    #[test]
    fn instruction_alone_does_not_change_position() {
        let mut engine = SignalEngine::new(&[id()], ma_only_config());
        engine.on_bar(&make_bar(0, 10.0), &ma(1.0, 2.0)).unwrap();
        engine.on_bar(&make_bar(1, 10.0), &ma(3.0, 2.0)).unwrap();
        assert_eq!(engine.position(&id()), Some(0.0));
        assert!(engine.ledger().open_trade(&id()).is_none());

        // still flat, window of 1 has moved on: no repeat signal
        let outcome = engine.on_bar(&make_bar(2, 10.0), &ma(3.5, 2.0)).unwrap();
        assert!(outcome.instruction().is_none());
    }

    #[test]
    fn fills_drive_ledger() {
        let mut engine = SignalEngine::new(&[id()], ma_only_config());
        engine.on_bar(&make_bar(0, 100.0), &ma(1.0, 2.0)).unwrap();
        engine.on_bar(&make_bar(1, 100.0), &ma(3.0, 2.0)).unwrap();
        engine.on_fill(&fill(1, 100.0, 10.0)).unwrap();
        assert_eq!(engine.weight(&id()), Some(0.5));
        assert_eq!(engine.ledger().open_trade(&id()).unwrap().combo, "MA:BUY");

        let outcome = engine.on_bar(&make_bar(2, 110.0), &ma(1.0, 2.0)).unwrap();
        assert_eq!(outcome.instruction().unwrap().action, Action::Exit);
        engine.on_fill(&fill(2, 110.0, -10.0)).unwrap();

        let bucket = &engine.ledger().buckets(&id()).unwrap()["MA:BUY"];
        assert_eq!(bucket.count, 1);
        assert!((bucket.total_return - 10.0).abs() < 1e-9);
        assert_eq!(engine.position(&id()), Some(0.0));
        assert_eq!(engine.weight(&id()), Some(0.0));
    }

    #[test]
    fn warmup_updates_windows_without_deciding() {
        let config = EngineConfig {
            warmup_bars: 2,
            trigger_window: 3,
            ..ma_only_config()
        };
        let mut engine = SignalEngine::new(&[id()], config);
        engine.on_bar(&make_bar(0, 10.0), &ma(1.0, 2.0)).unwrap();
        let warm = engine.on_bar(&make_bar(1, 10.0), &ma(3.0, 2.0)).unwrap();
        assert_eq!(warm, BarOutcome::WarmingUp);
        // the BUY from bar 1 is still in the window
        let outcome = engine.on_bar(&make_bar(2, 10.0), &ma(3.5, 2.0)).unwrap();
        assert!(matches!(
            outcome.instruction().unwrap().action,
            Action::Enter { .. }
        ));
    }

    #[test]
    fn trailing_stop_armed_then_cancelled() {
        let config = EngineConfig {
            policy: PolicyConfig {
                trailing_stop_pct: Some(5.0),
                flip_on_reversal: false,
                ..Default::default()
            },
            ..ma_only_config()
        };
        let mut engine = SignalEngine::new(&[id()], config);
        engine.on_bar(&make_bar(0, 100.0), &ma(1.0, 2.0)).unwrap();
        let entry = engine.on_bar(&make_bar(1, 100.0), &ma(3.0, 2.0)).unwrap();
        assert_eq!(
            entry.instruction().unwrap().arm_trailing_stop,
            Some(TrailingStopRequest { trail_pct: 5.0 })
        );
        engine.on_fill(&fill(1, 100.0, 10.0)).unwrap();
        assert!(engine.trailing_stop_active(&id()));

        let exit = engine.on_bar(&make_bar(2, 90.0), &ma(1.0, 2.0)).unwrap();
        let instruction = exit.instruction().unwrap();
        assert!(instruction.cancel_trailing_stop);
        assert!(instruction.arm_trailing_stop.is_none());
    }

    #[test]
    fn trailing_stop_fill_closes_trade() {
        let mut engine = SignalEngine::new(&[id()], ma_only_config());
        engine.on_bar(&make_bar(0, 100.0), &ma(1.0, 2.0)).unwrap();
        engine.on_bar(&make_bar(1, 100.0), &ma(3.0, 2.0)).unwrap();
        engine.on_fill(&fill(1, 100.0, 10.0)).unwrap();
        engine
            .on_fill(&Fill {
                is_trailing_stop: true,
                ..fill(3, 95.0, -10.0)
            })
            .unwrap();
        let bucket = &engine.ledger().buckets(&id()).unwrap()["MA:BUY"];
        assert_eq!(bucket.trailing_stop_exits, 1);
        assert!(!engine.trailing_stop_active(&id()));
    }

    #[test]
    fn flip_fills_close_and_reopen() {
        let config = EngineConfig {
            policy: PolicyConfig::default(),
            ..ma_only_config()
        };
        let mut engine = SignalEngine::new(&[id()], config);
        engine.on_bar(&make_bar(0, 100.0), &ma(1.0, 2.0)).unwrap();
        engine.on_bar(&make_bar(1, 100.0), &ma(3.0, 2.0)).unwrap();
        engine.on_fill(&fill(1, 100.0, 10.0)).unwrap();

        let outcome = engine.on_bar(&make_bar(2, 90.0), &ma(1.0, 2.0)).unwrap();
        let instruction = outcome.instruction().unwrap();
        assert_eq!(instruction.target_weight, -0.1);
        assert_eq!(instruction.combo, "MA:SELL");

        engine.on_fill(&fill(2, 90.0, -10.0)).unwrap();
        engine.on_fill(&fill(2, 90.0, -5.0)).unwrap();
        assert_eq!(engine.position(&id()), Some(-5.0));
        assert_eq!(engine.weight(&id()), Some(0.1));
        let open = engine.ledger().open_trade(&id()).unwrap();
        assert_eq!(open.combo, "MA:SELL");
        assert_eq!(open.quantity, -5.0);
        assert_eq!(engine.ledger().buckets(&id()).unwrap()["MA:BUY"].count, 1);
    }

    #[test]
    fn flip_keeps_track_of_rearmed_stop() {
        let config = EngineConfig {
            policy: PolicyConfig {
                trailing_stop_pct: Some(5.0),
                ..Default::default()
            },
            ..ma_only_config()
        };
        let mut engine = SignalEngine::new(&[id()], config);
        engine.on_bar(&make_bar(0, 100.0), &ma(1.0, 2.0)).unwrap();
        engine.on_bar(&make_bar(1, 100.0), &ma(3.0, 2.0)).unwrap();
        engine.on_fill(&fill(1, 100.0, 10.0)).unwrap();
        assert!(engine.trailing_stop_active(&id()));

        let flip = engine.on_bar(&make_bar(2, 90.0), &ma(1.0, 2.0)).unwrap();
        let instruction = flip.instruction().unwrap();
        assert!(matches!(instruction.action, Action::Flip { .. }));
        assert!(instruction.cancel_trailing_stop);
        assert!(instruction.arm_trailing_stop.is_some());

        // liquidation passes through flat, the entry re-arms
        engine.on_fill(&fill(2, 90.0, -10.0)).unwrap();
        assert!(!engine.trailing_stop_active(&id()));
        engine.on_fill(&fill(2, 90.0, -5.0)).unwrap();
        assert_eq!(engine.position(&id()), Some(-5.0));
        assert!(engine.trailing_stop_active(&id()));

        let reversal = engine.on_bar(&make_bar(3, 95.0), &ma(3.0, 2.0)).unwrap();
        let instruction = reversal.instruction().unwrap();
        assert!(matches!(instruction.action, Action::Flip { .. }));
        assert!(instruction.cancel_trailing_stop);
    }

    #[test]
    fn unfilled_entry_does_not_arm_stop() {
        let config = EngineConfig {
            policy: PolicyConfig {
                trailing_stop_pct: Some(5.0),
                ..Default::default()
            },
            ..ma_only_config()
        };
        let mut engine = SignalEngine::new(&[id()], config);
        engine.on_bar(&make_bar(0, 100.0), &ma(1.0, 2.0)).unwrap();
        let entry = engine.on_bar(&make_bar(1, 100.0), &ma(3.0, 2.0)).unwrap();
        assert!(entry.instruction().unwrap().arm_trailing_stop.is_some());
        assert!(!engine.trailing_stop_active(&id()));
    }

    #[test]
    fn report_counts_signals() {
        let mut engine = SignalEngine::new(&[id()], ma_only_config());
        engine.on_bar(&make_bar(0, 10.0), &ma(1.0, 2.0)).unwrap();
        engine.on_bar(&make_bar(1, 10.0), &ma(3.0, 2.0)).unwrap();
        engine.on_bar(&make_bar(2, 10.0), &ma(1.0, 2.0)).unwrap();
        let report = engine.report();
        let counts = &report.instruments[0].signal_counts["MA"];
        assert_eq!(counts.buy, 1);
        assert_eq!(counts.sell, 1);
    }
}
