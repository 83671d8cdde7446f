//! Backtest results sink port.

use crate::domain::backtest::TradeRecord;
use crate::domain::error::SigtraderError;
use std::path::PathBuf;

/// Port for persisting the trade records of one backtest run.
pub trait ResultsPort {
    /// Write all `records` for `strategy` and return where they landed.
    fn write(&self, strategy: &str, records: &[TradeRecord]) -> Result<PathBuf, SigtraderError>;
}
