//! Net signal aggregation across indicators.

use crate::domain::policy::Thresholds;
use crate::domain::signal::{IndicatorKind, SignalEvent, SignalTag};
use crate::domain::signal_window::SignalWindow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Ledger key used when no indicator contributed to an entry.
pub const NO_SIGNAL: &str = "NO_SIGNAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregationMode {
    /// Every directional signal counts 1.
    Count,
    /// Every directional signal counts its configured weight.
    #[default]
    Weighted,
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationMode::Count => write!(f, "count"),
            AggregationMode::Weighted => write!(f, "weighted"),
        }
    }
}

impl FromStr for AggregationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "count" => Ok(AggregationMode::Count),
            "weighted" => Ok(AggregationMode::Weighted),
            other => Err(format!("unknown mode '{other}', expected count or weighted")),
        }
    }
}

/// Static aggregation settings, fixed at engine construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationConfig {
    pub enabled: BTreeSet<IndicatorKind>,
    pub weights: BTreeMap<IndicatorKind, f64>,
    pub mode: AggregationMode,
    pub entry_threshold: f64,
    pub exit_threshold: f64,
}

impl AggregationConfig {
    /// All indicators enabled, every weight 1.0.
    pub fn all_enabled(entry_threshold: f64, exit_threshold: f64) -> Self {
        AggregationConfig {
            enabled: IndicatorKind::ALL.into_iter().collect(),
            weights: BTreeMap::new(),
            mode: AggregationMode::Weighted,
            entry_threshold,
            exit_threshold,
        }
    }

    pub fn weight(&self, kind: IndicatorKind) -> f64 {
        match self.mode {
            AggregationMode::Count => 1.0,
            AggregationMode::Weighted => self.weights.get(&kind).copied().unwrap_or(1.0),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            entry: self.entry_threshold,
            exit: self.exit_threshold,
        }
    }
}

/// Signed score plus the contributing tags in [`IndicatorKind`] order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetSignal {
    pub score: f64,
    pub active: Vec<SignalTag>,
}

impl NetSignal {
    /// All contributing tags, sorted lexically and comma-joined.
    pub fn combo_key(&self) -> String {
        combo_key(self.active.iter().copied())
    }

    /// Tags agreeing with `direction` only, as a ledger key.
    pub fn combo_for(&self, direction: SignalEvent) -> String {
        combo_key(self.active.iter().copied().filter(|t| t.event == direction))
    }
}

fn combo_key(tags: impl Iterator<Item = SignalTag>) -> String {
    let mut names: Vec<String> = tags.map(|t| t.to_string()).collect();
    if names.is_empty() {
        return NO_SIGNAL.to_string();
    }
    names.sort();
    names.join(", ")
}

/// Combine the latest directional event of each enabled window.
///
/// Windows for indicators that are not enabled are ignored.
pub fn aggregate(
    config: &AggregationConfig,
    windows: &BTreeMap<IndicatorKind, SignalWindow>,
) -> NetSignal {
    let mut net = NetSignal::default();
    for (&kind, window) in windows {
        if !config.enabled.contains(&kind) {
            continue;
        }
        let event = window.latest_directional();
        let weight = config.weight(kind);
        match event {
            SignalEvent::Buy => net.score += weight,
            SignalEvent::Sell => net.score -= weight,
            SignalEvent::None => continue,
        }
        net.active.push(SignalTag { kind, event });
    }
    net
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windows_with(events: &[(IndicatorKind, SignalEvent)]) -> BTreeMap<IndicatorKind, SignalWindow> {
        events
            .iter()
            .map(|&(kind, event)| {
                let mut w = SignalWindow::new(5);
                w.push(event);
                (kind, w)
            })
            .collect()
    }

    fn count_config(kinds: &[IndicatorKind]) -> AggregationConfig {
        AggregationConfig {
            enabled: kinds.iter().copied().collect(),
            weights: BTreeMap::new(),
            mode: AggregationMode::Count,
            entry_threshold: 1.0,
            exit_threshold: 1.0,
        }
    }

    #[test]
    fn buy_and_sell_cancel_in_count_mode() {
        let kinds = [IndicatorKind::Ma, IndicatorKind::Stoch, IndicatorKind::Mfi];
        let windows = windows_with(&[
            (IndicatorKind::Ma, SignalEvent::Buy),
            (IndicatorKind::Stoch, SignalEvent::Sell),
            (IndicatorKind::Mfi, SignalEvent::None),
        ]);
        let net = aggregate(&count_config(&kinds), &windows);
        assert!(net.score.abs() < f64::EPSILON);
        assert_eq!(net.active.len(), 2);
        assert_eq!(net.combo_key(), "MA:BUY, STOCH:SELL");
    }

    #[test]
    fn weights_apply_in_weighted_mode() {
        let mut config = count_config(&[IndicatorKind::Ma, IndicatorKind::Vol]);
        config.mode = AggregationMode::Weighted;
        config.weights.insert(IndicatorKind::Ma, 2.5);
        config.weights.insert(IndicatorKind::Vol, 0.5);
        let windows = windows_with(&[
            (IndicatorKind::Ma, SignalEvent::Buy),
            (IndicatorKind::Vol, SignalEvent::Sell),
        ]);
        let net = aggregate(&config, &windows);
        assert!((net.score - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn count_mode_ignores_weights() {
        let mut config = count_config(&[IndicatorKind::Ma]);
        config.weights.insert(IndicatorKind::Ma, 7.0);
        let windows = windows_with(&[(IndicatorKind::Ma, SignalEvent::Buy)]);
        assert!((aggregate(&config, &windows).score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn disabled_indicator_is_skipped() {
        let config = count_config(&[IndicatorKind::Ma]);
        let windows = windows_with(&[
            (IndicatorKind::Ma, SignalEvent::Buy),
            (IndicatorKind::Lbr, SignalEvent::Buy),
        ]);
        let net = aggregate(&config, &windows);
        assert!((net.score - 1.0).abs() < f64::EPSILON);
        assert_eq!(net.combo_key(), "MA:BUY");
    }

    #[test]
    fn active_tags_follow_kind_order() {
        let config = count_config(&IndicatorKind::ALL);
        let windows = windows_with(&[
            (IndicatorKind::Vol, SignalEvent::Buy),
            (IndicatorKind::Lbr, SignalEvent::Sell),
            (IndicatorKind::Ma, SignalEvent::Buy),
        ]);
        let net = aggregate(&config, &windows);
        let kinds: Vec<_> = net.active.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![IndicatorKind::Lbr, IndicatorKind::Ma, IndicatorKind::Vol]
        );
    }

    #[test]
    fn empty_combo_is_no_signal() {
        let net = NetSignal::default();
        assert_eq!(net.combo_key(), NO_SIGNAL);
        assert_eq!(net.combo_for(SignalEvent::Buy), NO_SIGNAL);
    }

    #[test]
    fn combo_for_keeps_agreeing_tags() {
        let config = count_config(&IndicatorKind::ALL);
        let windows = windows_with(&[
            (IndicatorKind::Vol, SignalEvent::Buy),
            (IndicatorKind::Lbr, SignalEvent::Sell),
            (IndicatorKind::Ma, SignalEvent::Buy),
        ]);
        let net = aggregate(&config, &windows);
        assert_eq!(net.combo_for(SignalEvent::Buy), "MA:BUY, VOL:BUY");
        assert_eq!(net.combo_for(SignalEvent::Sell), "LBR:SELL");
    }

    #[test]
    fn mode_parses() {
        assert_eq!("COUNT".parse::<AggregationMode>(), Ok(AggregationMode::Count));
        assert!("sum".parse::<AggregationMode>().is_err());
    }
}
