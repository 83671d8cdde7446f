//! CSV sink for backtest trade records.
//!
//! Each run replaces `<dir>/<strategy>.csv`. Prices and percentages are
//! written with two decimals.

use crate::domain::backtest::TradeRecord;
use crate::domain::error::SigtraderError;
use crate::ports::results_port::ResultsPort;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_RESULTS_DIR: &str = "backtest_results";

#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    date: String,
    symbol: &'a str,
    entry_price: String,
    exit_date: String,
    exit_price: String,
    gain_pct: String,
    holding_days: i64,
    outcome: &'static str,
}

impl<'a> From<&'a TradeRecord> for ResultRow<'a> {
    fn from(r: &'a TradeRecord) -> Self {
        Self {
            date: r.entry_date.format("%Y-%m-%d").to_string(),
            symbol: &r.symbol,
            entry_price: format!("{:.2}", r.entry_price),
            exit_date: r
                .exit_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            exit_price: format!("{:.2}", r.exit_price),
            gain_pct: format!("{:.2}", r.gain_pct),
            holding_days: r.holding_days,
            outcome: r.outcome.as_str(),
        }
    }
}

pub struct CsvResultsAdapter {
    dir: PathBuf,
}

impl CsvResultsAdapter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, strategy: &str) -> PathBuf {
        self.dir.join(format!("{strategy}.csv"))
    }
}

impl ResultsPort for CsvResultsAdapter {
    fn write(&self, strategy: &str, records: &[TradeRecord]) -> Result<PathBuf, SigtraderError> {
        let path = self.path_for(strategy);
        let persist_err = |reason: String| SigtraderError::Persistence {
            path: path.display().to_string(),
            reason,
        };

        fs::create_dir_all(&self.dir).map_err(|e| persist_err(e.to_string()))?;
        let mut wtr = csv::Writer::from_path(&path).map_err(|e| persist_err(e.to_string()))?;
        for record in records {
            wtr.serialize(ResultRow::from(record))
                .map_err(|e| persist_err(e.to_string()))?;
        }
        wtr.flush().map_err(|e| persist_err(e.to_string()))?;

        info!(path = %path.display(), trades = records.len(), "backtest results written");
        Ok(path)
    }
}
