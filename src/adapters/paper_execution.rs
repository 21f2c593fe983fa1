//! Paper execution adapter.
//!
//! Fills target-weight instructions at the bar close with slippage and
//! commission, in whole shares, and simulates armed trailing stops. Cash is
//! signed-position accounting: buying spends cash, selling (including short
//! sales) receives it, and equity is cash plus marked positions.

use crate::domain::backtest::BacktestConfig;
use crate::domain::engine::Fill;
use crate::domain::instrument::InstrumentId;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::policy::{Action, Instruction};
use crate::ports::execution_port::ExecutionPort;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub initial_capital: f64,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            initial_capital: 100_000.0,
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
        }
    }
}

impl From<&BacktestConfig> for ExecutionConfig {
    fn from(config: &BacktestConfig) -> Self {
        ExecutionConfig {
            initial_capital: config.initial_capital,
            commission_per_trade: config.commission_per_trade,
            commission_pct: config.commission_pct,
            slippage_pct: config.slippage_pct,
        }
    }
}

/// flat fee + (trade_value * pct / 100)
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Buys fill above the market, sells below.
pub fn apply_slippage(market_price: f64, buying: bool, slippage_pct: f64) -> f64 {
    if buying {
        market_price * (1.0 + slippage_pct / 100.0)
    } else {
        market_price * (1.0 - slippage_pct / 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TrailingStop {
    trail_pct: f64,
    /// Most favourable price since arming.
    extreme: f64,
}

impl TrailingStop {
    fn stop_price(&self, long: bool) -> f64 {
        if long {
            self.extreme * (1.0 - self.trail_pct / 100.0)
        } else {
            self.extreme * (1.0 + self.trail_pct / 100.0)
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Holding {
    quantity: i64,
    last_price: f64,
    stop: Option<TrailingStop>,
}

pub struct PaperExecution {
    config: ExecutionConfig,
    cash: f64,
    holdings: BTreeMap<InstrumentId, Holding>,
}

impl PaperExecution {
    pub fn new(config: ExecutionConfig) -> Self {
        PaperExecution {
            cash: config.initial_capital,
            config,
            holdings: BTreeMap::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn quantity(&self, instrument: &InstrumentId) -> i64 {
        self.holdings.get(instrument).map_or(0, |h| h.quantity)
    }

    pub fn has_trailing_stop(&self, instrument: &InstrumentId) -> bool {
        self.holdings
            .get(instrument)
            .is_some_and(|h| h.stop.is_some())
    }

    /// Equity not tied up in open positions.
    fn buying_power(&self) -> f64 {
        let exposure: f64 = self
            .holdings
            .values()
            .map(|h| (h.quantity as f64 * h.last_price).abs())
            .sum();
        self.equity() - exposure
    }

    /// Trade `delta` shares at `market_price`. Orders that add exposure are
    /// rejected when their cost exceeds buying power.
    fn trade(
        &mut self,
        bar: &OhlcvBar,
        delta: i64,
        market_price: f64,
        is_trailing_stop: bool,
    ) -> Option<Fill> {
        if delta == 0 {
            return None;
        }
        let current = self.quantity(&bar.instrument);
        let buying = delta > 0;
        let price = apply_slippage(market_price, buying, self.config.slippage_pct);
        let value = delta.unsigned_abs() as f64 * price;
        let commission = calculate_commission(value, &self.config);

        let adds_exposure = (current + delta).abs() > current.abs();
        if adds_exposure && value + commission > self.buying_power() {
            warn!(
                instrument = %bar.instrument,
                quantity = delta,
                cost = value + commission,
                available = self.buying_power(),
                "order rejected: insufficient buying power"
            );
            return None;
        }

        self.cash -= delta as f64 * price + commission;
        let holding = self.holdings.entry(bar.instrument.clone()).or_default();
        holding.quantity += delta;
        holding.last_price = bar.close;
        if holding.quantity == 0 {
            holding.stop = None;
        }

        debug!(
            instrument = %bar.instrument,
            quantity = delta,
            price,
            commission,
            "fill"
        );
        Some(Fill {
            instrument: bar.instrument.clone(),
            time: bar.time,
            price,
            quantity: delta as f64,
            is_trailing_stop,
        })
    }

    fn target_quantity(&self, target_weight: f64, price: f64) -> i64 {
        if price <= 0.0 {
            return 0;
        }
        let shares = (target_weight.abs() * self.equity() / price).floor() as i64;
        if target_weight < 0.0 { -shares } else { shares }
    }
}

impl ExecutionPort for PaperExecution {
    fn process_bar(&mut self, bar: &OhlcvBar) -> Vec<Fill> {
        let Some(holding) = self.holdings.get_mut(&bar.instrument) else {
            return Vec::new();
        };
        holding.last_price = bar.close;
        let quantity = holding.quantity;
        let Some(stop) = holding.stop.as_mut() else {
            return Vec::new();
        };
        if quantity == 0 {
            holding.stop = None;
            return Vec::new();
        }

        let long = quantity > 0;
        let stop_price = stop.stop_price(long);
        let triggered = if long {
            bar.low <= stop_price
        } else {
            bar.high >= stop_price
        };

        if !triggered {
            stop.extreme = if long {
                stop.extreme.max(bar.high)
            } else {
                stop.extreme.min(bar.low)
            };
            return Vec::new();
        }

        let gapped = if long {
            bar.open <= stop_price
        } else {
            bar.open >= stop_price
        };
        let exit_price = if gapped { bar.open } else { stop_price };
        info!(
            instrument = %bar.instrument,
            stop_price,
            exit_price,
            "trailing stop triggered"
        );
        holding.stop = None;
        self.trade(bar, -quantity, exit_price, true)
            .into_iter()
            .collect()
    }

    fn submit(&mut self, instruction: &Instruction, bar: &OhlcvBar) -> Vec<Fill> {
        let mut fills = Vec::new();
        let current = self.quantity(&bar.instrument);

        if let Some(holding) = self.holdings.get_mut(&bar.instrument) {
            holding.last_price = bar.close;
            if instruction.cancel_trailing_stop {
                holding.stop = None;
            }
        }

        let buying = instruction.target_weight > 0.0;
        let price = apply_slippage(bar.close, buying, self.config.slippage_pct);
        let reverses = current != 0
            && instruction.target_weight != 0.0
            && (current > 0) != (instruction.target_weight > 0.0);

        match instruction.action {
            Action::Hold => {}
            Action::Exit => fills.extend(self.trade(bar, -current, bar.close, false)),
            Action::Flip { .. } => {
                fills.extend(self.trade(bar, -current, bar.close, false));
                let target = self.target_quantity(instruction.target_weight, price);
                fills.extend(self.trade(bar, target, bar.close, false));
            }
            Action::Enter { .. } | Action::ScaleIn { .. } => {
                if reverses {
                    fills.extend(self.trade(bar, -current, bar.close, false));
                }
                let current = self.quantity(&bar.instrument);
                let target = self.target_quantity(instruction.target_weight, price);
                let delta = target - current;
                if delta.signum() == target.signum() {
                    fills.extend(self.trade(bar, delta, bar.close, false));
                } else {
                    debug!(
                        instrument = %bar.instrument,
                        current,
                        target,
                        "target below current position, not reducing"
                    );
                }
            }
        }

        if let Some(req) = instruction.arm_trailing_stop.filter(|_| !fills.is_empty()) {
            if let Some(holding) = self.holdings.get_mut(&bar.instrument) {
                if holding.quantity != 0 {
                    holding.stop = Some(TrailingStop {
                        trail_pct: req.trail_pct,
                        extreme: bar.close,
                    });
                }
            }
        }

        fills
    }

    fn equity(&self) -> f64 {
        self.cash
            + self
                .holdings
                .values()
                .map(|h| h.quantity as f64 * h.last_price)
                .sum::<f64>()
    }
}
