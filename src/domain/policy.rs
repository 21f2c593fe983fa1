//! Position decision policy.
//!
//! Maps (position side, current weight, net score) to an [`Action`]. A
//! score at or above the entry threshold is buy-side; a score at or below
//! the negated exit threshold is sell-side. Buy-side opens or adds to longs
//! and reverses shorts; sell-side does the mirror.

use crate::domain::instrument::InstrumentId;
use crate::domain::signal::SignalEvent;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const WEIGHT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PositionSide {
    #[default]
    Flat,
    Long,
    Short,
}

impl PositionSide {
    pub fn from_quantity(quantity: f64) -> Self {
        if quantity > 0.0 {
            PositionSide::Long
        } else if quantity < 0.0 {
            PositionSide::Short
        } else {
            PositionSide::Flat
        }
    }

    /// +1, -1 or 0.
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
            PositionSide::Flat => 0.0,
        }
    }

    /// Signal direction that agrees with this side.
    pub fn direction(self) -> SignalEvent {
        match self {
            PositionSide::Long => SignalEvent::Buy,
            PositionSide::Short => SignalEvent::Sell,
            PositionSide::Flat => SignalEvent::None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            PositionSide::Long => PositionSide::Short,
            PositionSide::Short => PositionSide::Long,
            PositionSide::Flat => PositionSide::Flat,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Flat => write!(f, "FLAT"),
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// What happens to the open trade record when a position is scaled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleInTrade {
    /// Keep entry time and combo; quantity grows, entry price becomes the
    /// average cost.
    #[default]
    Retain,
    /// Discard the open record and start a fresh one at the scale-in fill,
    /// sized to the full position.
    Replace,
}

impl FromStr for ScaleInTrade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retain" => Ok(ScaleInTrade::Retain),
            "replace" => Ok(ScaleInTrade::Replace),
            other => Err(format!("unknown value '{other}', expected retain or replace")),
        }
    }
}

impl fmt::Display for ScaleInTrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleInTrade::Retain => write!(f, "retain"),
            ScaleInTrade::Replace => write!(f, "replace"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub entry: f64,
    pub exit: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    pub first_trade_allocation: f64,
    pub repeat_trade_allocation: f64,
    pub max_allocation: f64,
    pub flip_on_reversal: bool,
    pub allow_shorting: bool,
    pub scale_in_trade: ScaleInTrade,
    /// Trail distance in percent; `None` disables trailing stops.
    pub trailing_stop_pct: Option<f64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            first_trade_allocation: 0.1,
            repeat_trade_allocation: 0.1,
            max_allocation: 1.0,
            flip_on_reversal: true,
            allow_shorting: true,
            scale_in_trade: ScaleInTrade::Retain,
            trailing_stop_pct: None,
        }
    }
}

/// Policy output. Weights are unsigned fractions of equity; the side gives
/// the sign.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Action {
    Hold,
    Enter { side: PositionSide, weight: f64 },
    ScaleIn { side: PositionSide, weight: f64 },
    /// Flatten, then enter `side` at `weight`.
    Flip { side: PositionSide, weight: f64 },
    Exit,
}

impl Action {
    /// Signed target weight after the action; `None` for `Hold`.
    pub fn target_weight(&self) -> Option<f64> {
        match *self {
            Action::Hold => None,
            Action::Enter { side, weight }
            | Action::ScaleIn { side, weight }
            | Action::Flip { side, weight } => Some(side.sign() * weight),
            Action::Exit => Some(0.0),
        }
    }

    /// Actions that leave an open position behind.
    pub fn opens_exposure(&self) -> bool {
        matches!(
            self,
            Action::Enter { .. } | Action::ScaleIn { .. } | Action::Flip { .. }
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Hold => write!(f, "HOLD"),
            Action::Enter { side, weight } => write!(f, "ENTER {side} {weight:.4}"),
            Action::ScaleIn { side, weight } => write!(f, "SCALE_IN {side} {weight:.4}"),
            Action::Flip { side, weight } => write!(f, "FLIP {side} {weight:.4}"),
            Action::Exit => write!(f, "EXIT"),
        }
    }
}

/// Decide the action for one bar.
///
/// `weight` is the absolute weight currently held (or requested) for the
/// position on `side`.
pub fn decide(
    config: &PolicyConfig,
    thresholds: Thresholds,
    side: PositionSide,
    weight: f64,
    score: f64,
) -> Action {
    let buy_side = score >= thresholds.entry;
    let sell_side = score <= -thresholds.exit;

    let signal_side = if buy_side {
        PositionSide::Long
    } else if sell_side {
        PositionSide::Short
    } else {
        return Action::Hold;
    };

    match side {
        PositionSide::Flat => enter(config, signal_side),
        current if current == signal_side => scale_in(config, current, weight),
        current => reverse(config, current.opposite()),
    }
}

fn enter(config: &PolicyConfig, side: PositionSide) -> Action {
    if side == PositionSide::Short && !config.allow_shorting {
        return Action::Hold;
    }
    Action::Enter {
        side,
        weight: config.first_trade_allocation.min(config.max_allocation),
    }
}

fn scale_in(config: &PolicyConfig, side: PositionSide, weight: f64) -> Action {
    if weight >= config.max_allocation - WEIGHT_EPSILON {
        return Action::Hold;
    }
    Action::ScaleIn {
        side,
        weight: (weight + config.repeat_trade_allocation).min(config.max_allocation),
    }
}

fn reverse(config: &PolicyConfig, new_side: PositionSide) -> Action {
    let can_enter = new_side == PositionSide::Long || config.allow_shorting;
    if config.flip_on_reversal && can_enter {
        Action::Flip {
            side: new_side,
            weight: config.first_trade_allocation.min(config.max_allocation),
        }
    } else {
        Action::Exit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrailingStopRequest {
    pub trail_pct: f64,
}

/// Target-position instruction for the execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    pub instrument: InstrumentId,
    pub bar_index: usize,
    pub time: NaiveDateTime,
    pub action: Action,
    /// Signed fraction of equity to hold after execution.
    pub target_weight: f64,
    /// Ledger key captured if this instruction opens a trade.
    pub combo: String,
    pub cancel_trailing_stop: bool,
    pub arm_trailing_stop: Option<TrailingStopRequest>,
}
