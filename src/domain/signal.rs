//! Discrete signal events and indicator identities.
//!
//! - `SignalEvent`: the per-bar output of an evaluator
//! - `IndicatorKind`: which evaluator produced it (doubles as map key)
//! - `SignalTag`: an `INDICATOR:DIRECTION` pair contributing to a net score

use crate::domain::error::ConfigValueError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Declaration order gives BUY < SELL < NONE.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum SignalEvent {
    Buy,
    Sell,
    #[default]
    None,
}

impl SignalEvent {
    pub fn is_directional(self) -> bool {
        !matches!(self, SignalEvent::None)
    }
}

impl fmt::Display for SignalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalEvent::Buy => write!(f, "BUY"),
            SignalEvent::Sell => write!(f, "SELL"),
            SignalEvent::None => write!(f, "NONE"),
        }
    }
}

/// Indicator identities.
///
/// Variants are declared in lexical order of their display names, so the
/// derived `Ord` gives the fixed alphabetical iteration order used by the
/// aggregator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum IndicatorKind {
    /// MACD-style oscillator vs. signal line.
    Lbr,
    /// Fast vs. slow moving average.
    Ma,
    /// Money flow index band crossing.
    Mfi,
    /// Stochastic RSI, K and D lines.
    Stoch,
    /// Up/down volume spike.
    Vol,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 5] = [
        IndicatorKind::Lbr,
        IndicatorKind::Ma,
        IndicatorKind::Mfi,
        IndicatorKind::Stoch,
        IndicatorKind::Vol,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IndicatorKind::Lbr => "LBR",
            IndicatorKind::Ma => "MA",
            IndicatorKind::Mfi => "MFI",
            IndicatorKind::Stoch => "STOCH",
            IndicatorKind::Vol => "VOL",
        }
    }

    /// Config key prefix, e.g. `ma` for `ma_weight`.
    pub fn key(self) -> String {
        self.name().to_lowercase()
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndicatorKind {
    type Err = ConfigValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LBR" | "MACD" => Ok(IndicatorKind::Lbr),
            "MA" => Ok(IndicatorKind::Ma),
            "MFI" => Ok(IndicatorKind::Mfi),
            "STOCH" | "SRSI" | "STOCHRSI" => Ok(IndicatorKind::Stoch),
            "VOL" | "VOLUME" => Ok(IndicatorKind::Vol),
            other => Err(ConfigValueError::UnknownIndicator(other.to_string())),
        }
    }
}

/// Parse a comma-separated indicator list. Rejects empty tokens, unknown
/// names and duplicates.
pub fn parse_indicator_list(input: &str) -> Result<BTreeSet<IndicatorKind>, ConfigValueError> {
    let mut kinds = BTreeSet::new();
    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(ConfigValueError::EmptyToken);
        }
        let kind: IndicatorKind = trimmed.parse()?;
        if !kinds.insert(kind) {
            return Err(ConfigValueError::Duplicate(kind.to_string()));
        }
    }
    Ok(kinds)
}

/// One contributing `INDICATOR:DIRECTION` entry of a net score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignalTag {
    pub kind: IndicatorKind,
    pub event: SignalEvent,
}

impl fmt::Display for SignalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_order_is_alphabetical_by_name() {
        let mut names: Vec<&str> = IndicatorKind::ALL.iter().map(|k| k.name()).collect();
        let declared = names.clone();
        names.sort();
        assert_eq!(names, declared);
    }

    #[test]
    fn kind_parse_accepts_aliases() {
        assert_eq!("ma".parse::<IndicatorKind>(), Ok(IndicatorKind::Ma));
        assert_eq!("MACD".parse::<IndicatorKind>(), Ok(IndicatorKind::Lbr));
        assert_eq!(" srsi ".parse::<IndicatorKind>(), Ok(IndicatorKind::Stoch));
        assert_eq!("volume".parse::<IndicatorKind>(), Ok(IndicatorKind::Vol));
    }

    #[test]
    fn kind_parse_rejects_unknown() {
        assert_eq!(
            "RSI".parse::<IndicatorKind>(),
            Err(ConfigValueError::UnknownIndicator("RSI".into()))
        );
    }

    #[test]
    fn parse_list_rejects_duplicates_and_empty_tokens() {
        assert_eq!(
            parse_indicator_list("MA,STOCH,ma"),
            Err(ConfigValueError::Duplicate("MA".into()))
        );
        assert_eq!(
            parse_indicator_list("MA,,VOL"),
            Err(ConfigValueError::EmptyToken)
        );
    }

    #[test]
    fn parse_list_returns_sorted_set() {
        let kinds = parse_indicator_list("VOL, MA, LBR").unwrap();
        let ordered: Vec<_> = kinds.into_iter().collect();
        assert_eq!(
            ordered,
            vec![IndicatorKind::Lbr, IndicatorKind::Ma, IndicatorKind::Vol]
        );
    }

    #[test]
    fn tag_display() {
        let tag = SignalTag {
            kind: IndicatorKind::Stoch,
            event: SignalEvent::Sell,
        };
        assert_eq!(tag.to_string(), "STOCH:SELL");
    }

    #[test]
    fn none_is_not_directional() {
        assert!(SignalEvent::Buy.is_directional());
        assert!(SignalEvent::Sell.is_directional());
        assert!(!SignalEvent::None.is_directional());
    }
}
