//! Strategy registry.
//!
//! Strategies are resolved by identifier to a tagged variant. Each registry
//! entry declares which operations it supports; callers ask for an operation
//! and get `UnsupportedStrategy` back when the entry does not offer it.

use std::collections::BTreeMap;
use tracing::warn;

use super::backtest::BacktestConfig;
use super::error::SigtraderError;
use super::ohlcv::{Series, Window};
use super::position::Holding;
use super::signal::Signal;
use super::volume_breakout;
use crate::ports::broker_port::BrokerPort;

pub const VOLUME_BREAKOUT: &str = "volume_breakout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    VolumeBreakout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub generate_signals: bool,
    pub generate_exit_signals: bool,
    pub backtest: bool,
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        generate_signals: true,
        generate_exit_signals: true,
        backtest: true,
    };
}

/// Parameters for live entry scans.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalParams {
    pub lookback_days: usize,
    pub volume_multiplier: f64,
}

/// Profit target and stop loss as fractions of the entry price.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitParams {
    pub profit_pct: f64,
    pub loss_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyEntry {
    pub id: String,
    pub kind: StrategyKind,
    pub capabilities: Capabilities,
}

impl StrategyEntry {
    fn unsupported(&self, capability: &str) -> SigtraderError {
        SigtraderError::UnsupportedStrategy {
            name: self.id.clone(),
            capability: capability.to_string(),
        }
    }

    /// The per-window signal function used by the backtest driver.
    pub fn backtest_fn(
        &self,
    ) -> Result<impl Fn(&Window<'_>, &str, &BacktestConfig) -> Option<Signal> + use<>, SigtraderError>
    {
        if !self.capabilities.backtest {
            return Err(self.unsupported("backtest"));
        }
        let kind = self.kind;
        Ok(move |window: &Window<'_>, symbol: &str, config: &BacktestConfig| match kind {
            StrategyKind::VolumeBreakout => volume_breakout::backtest_signal(
                window,
                symbol,
                config.lookback_days,
                config.volume_multiplier,
            ),
        })
    }

    /// Entry signals from the latest bars of each symbol.
    pub fn generate_signals(
        &self,
        symbols: &[String],
        series_by_symbol: &BTreeMap<String, Series>,
        params: &SignalParams,
    ) -> Result<Vec<Signal>, SigtraderError> {
        if !self.capabilities.generate_signals {
            return Err(self.unsupported("generate_signals"));
        }
        Ok(match self.kind {
            StrategyKind::VolumeBreakout => volume_breakout::latest_signals(
                symbols,
                series_by_symbol,
                params.lookback_days,
                params.volume_multiplier,
            ),
        })
    }

    /// Sell signals for holdings that reached the profit target or stop loss.
    ///
    /// A holding that cannot be priced is reported and left open.
    pub fn generate_exit_signals(
        &self,
        holdings: &[Holding],
        broker: &dyn BrokerPort,
        params: &ExitParams,
    ) -> Result<Vec<Signal>, SigtraderError> {
        if !self.capabilities.generate_exit_signals {
            return Err(self.unsupported("generate_exit_signals"));
        }
        let mut signals = Vec::new();
        for holding in holdings {
            let price = match broker.latest_price(&holding.symbol) {
                Ok(p) => p,
                Err(e) => {
                    warn!(symbol = %holding.symbol, error = %e, "could not evaluate exit");
                    continue;
                }
            };
            let Some(gain) = holding.gain_at(price) else {
                warn!(symbol = %holding.symbol, entry_price = holding.entry_price, "unusable entry price");
                continue;
            };
            if gain >= params.profit_pct {
                signals.push(Signal::sell(&holding.symbol, holding.quantity).with_note("profit target"));
            } else if gain <= -params.loss_pct {
                signals.push(Signal::sell(&holding.symbol, holding.quantity).with_note("stop loss"));
            }
        }
        Ok(signals)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    entries: BTreeMap<String, StrategyEntry>,
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in strategy.
    pub fn builtin() -> Self {
        Self::empty().with(VOLUME_BREAKOUT, StrategyKind::VolumeBreakout, Capabilities::ALL)
    }

    pub fn with(mut self, id: &str, kind: StrategyKind, capabilities: Capabilities) -> Self {
        self.entries.insert(
            id.to_string(),
            StrategyEntry {
                id: id.to_string(),
                kind,
                capabilities,
            },
        );
        self
    }

    pub fn get(&self, id: &str) -> Result<&StrategyEntry, SigtraderError> {
        self.entries
            .get(id.trim())
            .ok_or_else(|| SigtraderError::UnknownStrategy {
                name: id.trim().to_string(),
            })
    }

    pub fn entries(&self) -> impl Iterator<Item = &StrategyEntry> {
        self.entries.values()
    }
}
