//! Ticker universe resolution.
//!
//! Tickers come from an explicit comma-separated list or from a ticker file
//! (CSV with a `symbol` column and an optional `index` column used for
//! filtering), optionally capped to the first `max_tickers` entries.

use crate::domain::error::SigtraderError;
use crate::ports::config_port::ConfigPort;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

pub const DEFAULT_TICKERS_FILE: &str = "data/tickers.csv";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

/// Read tickers from a CSV file, keeping rows whose `index` column contains
/// `index_filter` when one is given. Duplicates keep their first position.
///
/// Errors are reported against `section`'s `tickers_file` key.
pub fn load_tickers(
    path: &Path,
    section: &str,
    index_filter: Option<&str>,
) -> Result<Vec<String>, SigtraderError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| {
        SigtraderError::invalid_config(
            section,
            "tickers_file",
            format!("failed to read {}: {e}", path.display()),
        )
    })?;

    let headers = rdr
        .headers()
        .map_err(|e| SigtraderError::invalid_config(section, "tickers_file", e.to_string()))?
        .clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };
    let symbol_col = find("symbol").ok_or_else(|| {
        SigtraderError::invalid_config(
            section,
            "tickers_file",
            format!("{} has no symbol column", path.display()),
        )
    })?;
    let index_col = find("index");

    let mut tickers = Vec::new();
    let mut seen = HashSet::new();
    for record in rdr.records() {
        let record = record
            .map_err(|e| SigtraderError::invalid_config(section, "tickers_file", e.to_string()))?;
        if let Some(filter) = index_filter {
            let index = index_col.and_then(|i| record.get(i)).unwrap_or("");
            if !index.contains(filter) {
                continue;
            }
        }
        let symbol = record.get(symbol_col).unwrap_or("").trim().to_uppercase();
        if !symbol.is_empty() && seen.insert(symbol.clone()) {
            tickers.push(symbol);
        }
    }

    Ok(tickers)
}

/// Resolve the ticker universe for `section`.
///
/// An explicit override wins, then the `tickers` key, then `tickers_file`
/// (default [`DEFAULT_TICKERS_FILE`]). `max_tickers` caps the result.
pub fn resolve_tickers(
    config: &dyn ConfigPort,
    section: &str,
    tickers_override: Option<&str>,
    max_tickers: Option<usize>,
) -> Result<Vec<String>, SigtraderError> {
    let explicit = tickers_override
        .map(str::to_string)
        .or_else(|| config.get_string(section, "tickers"))
        .filter(|s| !s.trim().is_empty());

    let mut tickers = match explicit {
        Some(list) => parse_tickers(&list)
            .map_err(|e| SigtraderError::invalid_config(section, "tickers", e.to_string()))?,
        None => {
            let file = config
                .get_string(section, "tickers_file")
                .unwrap_or_else(|| DEFAULT_TICKERS_FILE.to_string());
            let filter = config
                .get_string(section, "index_filter")
                .filter(|s| !s.trim().is_empty());
            let loaded = load_tickers(Path::new(&file), section, filter.as_deref())?;
            info!(file = %file, count = loaded.len(), "loaded tickers");
            loaded
        }
    };

    if let Some(max) = max_tickers {
        tickers.truncate(max);
    }

    if tickers.is_empty() {
        return Err(SigtraderError::invalid_config(
            section,
            "tickers",
            "no tickers configured",
        ));
    }

    Ok(tickers)
}
