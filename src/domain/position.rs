//! Live positions and trade ledger rows.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use super::error::SigtraderError;
use super::signal::Action;

/// Where an order was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Paper,
    Live,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Paper => "paper",
            Environment::Live => "live",
        }
    }
}

impl FromStr for Environment {
    type Err = SigtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paper" => Ok(Environment::Paper),
            "live" => Ok(Environment::Live),
            other => Err(SigtraderError::invalid_config(
                "live",
                "env",
                format!("expected paper or live, got {other}"),
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeStatus {
    Executed,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Executed => "executed",
            TradeStatus::Closed => "closed",
        }
    }
}

/// One row of the live trade ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub timestamp: NaiveDateTime,
    pub symbol: String,
    pub action: Action,
    pub quantity: i64,
    pub price: f64,
    pub strategy: String,
    pub env: Environment,
    pub status: TradeStatus,
    pub notes: Option<String>,
}

/// An open buy that has not been closed out.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub timestamp: NaiveDateTime,
}

impl Holding {
    /// Fractional return at `price`, or `None` when the entry price is unusable.
    pub fn gain_at(&self, price: f64) -> Option<f64> {
        if !self.entry_price.is_finite() || self.entry_price <= 0.0 || !price.is_finite() {
            return None;
        }
        Some((price - self.entry_price) / self.entry_price)
    }
}
