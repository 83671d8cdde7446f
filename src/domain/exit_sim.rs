//! First-touch exit simulation over the bars following an entry.
//!
//! The profit target is checked before the stop loss on every bar, so a bar
//! whose range spans both levels resolves as a win. The simulation only ever
//! looks at the bar under evaluation and the ones before it.

use chrono::NaiveDate;
use std::fmt;
use tracing::warn;

use super::error::SigtraderError;
use super::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Win,
    Loss,
    Hold,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
            Outcome::Hold => "hold",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub exit_date: Option<NaiveDate>,
    pub exit_price: f64,
    pub outcome: Outcome,
    /// Set when no forward bar could be evaluated and the exit was declared
    /// at the entry price.
    pub low_confidence: bool,
}

impl ExitResult {
    fn degenerate(entry_price: f64) -> Self {
        Self {
            exit_date: None,
            exit_price: entry_price,
            outcome: Outcome::Hold,
            low_confidence: true,
        }
    }
}

pub fn target_price(entry_price: f64, profit_pct: f64) -> f64 {
    entry_price * (1.0 + profit_pct)
}

pub fn stop_price(entry_price: f64, loss_pct: f64) -> f64 {
    entry_price * (1.0 - loss_pct)
}

fn check_parameters(entry_price: f64, profit_pct: f64, loss_pct: f64) -> Result<(), SigtraderError> {
    if !entry_price.is_finite() || entry_price <= 0.0 {
        return Err(SigtraderError::invalid_parameter(
            "entry_price",
            format!("must be positive and finite, got {entry_price}"),
        ));
    }
    if !profit_pct.is_finite() || profit_pct < 0.0 {
        return Err(SigtraderError::invalid_parameter(
            "profit_pct",
            format!("must be non-negative, got {profit_pct}"),
        ));
    }
    if !loss_pct.is_finite() || loss_pct < 0.0 {
        return Err(SigtraderError::invalid_parameter(
            "loss_pct",
            format!("must be non-negative, got {loss_pct}"),
        ));
    }
    Ok(())
}

/// Scan `forward_bars` chronologically for the first profit-target or
/// stop-loss touch, falling back to the last bar's close.
pub fn simulate_exit(
    entry_price: f64,
    forward_bars: &[OhlcvBar],
    profit_pct: f64,
    loss_pct: f64,
) -> Result<ExitResult, SigtraderError> {
    check_parameters(entry_price, profit_pct, loss_pct)?;

    let target = target_price(entry_price, profit_pct);
    let stop = stop_price(entry_price, loss_pct);

    for bar in forward_bars {
        if !bar.high.is_finite() || !bar.low.is_finite() {
            warn!(
                symbol = %bar.symbol,
                date = %bar.date,
                "skipping bar with unusable high/low during exit scan"
            );
            continue;
        }
        if bar.high >= target {
            return Ok(ExitResult {
                exit_date: Some(bar.date),
                exit_price: target,
                outcome: Outcome::Win,
                low_confidence: false,
            });
        }
        if bar.low <= stop {
            return Ok(ExitResult {
                exit_date: Some(bar.date),
                exit_price: stop,
                outcome: Outcome::Loss,
                low_confidence: false,
            });
        }
    }

    let Some(last) = forward_bars.last() else {
        return Ok(ExitResult::degenerate(entry_price));
    };

    if !last.close.is_finite() || last.close <= 0.0 {
        warn!(
            symbol = %last.symbol,
            date = %last.date,
            "final bar close unusable, exiting at entry price"
        );
        return Ok(ExitResult::degenerate(entry_price));
    }

    Ok(ExitResult {
        exit_date: Some(last.date),
        exit_price: last.close,
        outcome: Outcome::Hold,
        low_confidence: false,
    })
}
