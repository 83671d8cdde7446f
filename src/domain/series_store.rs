//! Series store: fetches raw provider tables and normalizes them into
//! validated per-symbol series.
//!
//! Every provider quirk (column labels, multi-level headers, timestamps with
//! a time component, rows for other symbols) is resolved here. Downstream
//! code only ever sees [`Series`].

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::error::SigtraderError;
use super::ohlcv::{OhlcvBar, Series};
use crate::ports::data_port::{DataPort, RawTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
    Symbol,
}

/// How a label matched its column. Exact labels win over suffixed ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Match {
    Exact,
    Suffixed,
}

/// Map a provider column label onto a canonical column.
///
/// Multi-level labels such as `('High', 'AAPL')` resolve to their first
/// level. Flattened labels like `High.AAPL` or `High_AAPL` only count when
/// the suffix is `symbol`, so `open_interest` or `close_time` never stand in
/// for a price column. Unrecognised labels (`Adj Close`, `trade_count`,
/// `vwap`, ...) are ignored.
fn canonical_column(label: &str, symbol: &str) -> Option<(Column, Match)> {
    let trimmed = label.trim();
    let first_level = if trimmed.starts_with('(') || trimmed.starts_with('[') {
        trimmed
            .trim_matches(|c| matches!(c, '(' | ')' | '[' | ']'))
            .split(',')
            .next()
            .unwrap_or("")
            .trim()
            .trim_matches(|c| c == '\'' || c == '"')
    } else {
        trimmed
    };
    let lower = first_level.to_lowercase();

    let lookup = |name: &str| match name {
        "date" | "timestamp" | "datetime" | "time" | "t" => Some(Column::Date),
        "open" | "o" => Some(Column::Open),
        "high" | "h" => Some(Column::High),
        "low" | "l" => Some(Column::Low),
        "close" | "c" => Some(Column::Close),
        "volume" | "vol" | "v" => Some(Column::Volume),
        "symbol" | "ticker" => Some(Column::Symbol),
        _ => None,
    };

    if lower.starts_with("adj") {
        return None;
    }
    if let Some(col) = lookup(&lower) {
        return Some((col, Match::Exact));
    }
    let (head, suffix) = lower.split_once(['.', '_'])?;
    if !suffix.eq_ignore_ascii_case(symbol) {
        return None;
    }
    lookup(head).map(|col| (col, Match::Suffixed))
}

struct ColumnIndex {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
    symbol: Option<usize>,
}

impl ColumnIndex {
    fn resolve(columns: &[String], symbol: &str) -> Result<Self, Vec<&'static str>> {
        let mut best: [Option<(usize, Match)>; 7] = [None; 7];
        for (i, label) in columns.iter().enumerate() {
            if let Some((col, quality)) = canonical_column(label, symbol) {
                let slot = &mut best[col as usize];
                if slot.is_none_or(|(_, held)| quality < held) {
                    *slot = Some((i, quality));
                }
            }
        }
        let found = best.map(|slot| slot.map(|(i, _)| i));

        let required = [
            (Column::Date, "date"),
            (Column::Open, "open"),
            (Column::High, "high"),
            (Column::Low, "low"),
            (Column::Close, "close"),
            (Column::Volume, "volume"),
        ];
        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(col, _)| found[*col as usize].is_none())
            .map(|(_, name)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }

        let at = |col: Column| found[col as usize].unwrap_or_default();
        Ok(Self {
            date: at(Column::Date),
            open: at(Column::Open),
            high: at(Column::High),
            low: at(Column::Low),
            close: at(Column::Close),
            volume: at(Column::Volume),
            symbol: found[Column::Symbol as usize],
        })
    }
}

/// Parse `YYYY-MM-DD`, ignoring any trailing time component.
pub fn parse_bar_date(cell: &str) -> Option<NaiveDate> {
    let s = cell.trim();
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn cell<'a>(row: &'a [String], idx: usize, name: &str) -> Result<&'a str, String> {
    row.get(idx)
        .map(|s| s.as_str())
        .ok_or_else(|| format!("missing {name} cell"))
}

fn number(row: &[String], idx: usize, name: &str) -> Result<f64, String> {
    let raw = cell(row, idx, name)?;
    raw.trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid {name} value {raw:?}: {e}"))
}

fn parse_row(symbol: &str, row: &[String], idx: &ColumnIndex) -> Result<OhlcvBar, String> {
    let date_raw = cell(row, idx.date, "date")?;
    let date = parse_bar_date(date_raw).ok_or_else(|| format!("invalid date {date_raw:?}"))?;
    let bar = OhlcvBar {
        symbol: symbol.to_string(),
        date,
        open: number(row, idx.open, "open")?,
        high: number(row, idx.high, "high")?,
        low: number(row, idx.low, "low")?,
        close: number(row, idx.close, "close")?,
        volume: number(row, idx.volume, "volume")?,
    };
    bar.validate().map_err(|e| e.to_string())?;
    Ok(bar)
}

/// Convert one provider table into canonical bars within `[start, end]`.
///
/// Unusable rows are skipped with a warning. Returns `None` when the table
/// lacks a required column.
pub fn normalize_table(
    symbol: &str,
    table: &RawTable,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<Vec<OhlcvBar>> {
    let idx = match ColumnIndex::resolve(&table.columns, symbol) {
        Ok(idx) => idx,
        Err(missing) => {
            warn!(%symbol, missing = ?missing, "missing expected OHLCV columns, skipping");
            return None;
        }
    };

    let mut bars = Vec::with_capacity(table.rows.len());
    for (line, row) in table.rows.iter().enumerate() {
        if let Some(sym_idx) = idx.symbol {
            let row_symbol = row.get(sym_idx).map(|s| s.trim()).unwrap_or("");
            if !row_symbol.is_empty() && !row_symbol.eq_ignore_ascii_case(symbol) {
                continue;
            }
        }
        match parse_row(symbol, row, &idx) {
            Ok(bar) if bar.date >= start && bar.date <= end => bars.push(bar),
            Ok(_) => {}
            Err(reason) => warn!(%symbol, row = line + 1, %reason, "skipping row"),
        }
    }

    bars.sort_by_key(|b| b.date);
    let before = bars.len();
    bars.dedup_by_key(|b| b.date);
    if bars.len() < before {
        warn!(%symbol, dropped = before - bars.len(), "dropped duplicate dates");
    }

    Some(bars)
}

pub struct SeriesStore<'a> {
    port: &'a dyn DataPort,
}

impl<'a> SeriesStore<'a> {
    pub fn new(port: &'a dyn DataPort) -> Self {
        Self { port }
    }

    /// Fetch a series for each symbol with at least one usable bar in range.
    ///
    /// Symbols without data are absent from the result; provider failures
    /// for a single symbol are reported and treated the same way.
    pub fn fetch(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<String, Series>, SigtraderError> {
        if symbols.is_empty() {
            return Err(SigtraderError::invalid_config(
                "backtest",
                "tickers",
                "at least one symbol is required",
            ));
        }
        if start > end {
            return Err(SigtraderError::invalid_config(
                "backtest",
                "start_date",
                "start_date must not be after end_date",
            ));
        }

        let mut out = BTreeMap::new();
        for symbol in symbols {
            if out.contains_key(symbol) {
                continue;
            }
            let table = match self.port.fetch_raw(symbol, start, end) {
                Ok(Some(table)) => table,
                Ok(None) => {
                    debug!(%symbol, "provider has no data");
                    continue;
                }
                Err(e) => {
                    warn!(%symbol, error = %e, "fetch failed, treating as no data");
                    continue;
                }
            };

            let Some(bars) = normalize_table(symbol, &table, start, end) else {
                continue;
            };
            if bars.is_empty() {
                debug!(%symbol, "no bars in range");
                continue;
            }

            match Series::new(symbol.clone(), bars) {
                Ok(series) => {
                    out.insert(symbol.clone(), series);
                }
                Err(e) => warn!(%symbol, error = %e, "rejected series"),
            }
        }

        info!(requested = symbols.len(), fetched = out.len(), "series fetched");
        Ok(out)
    }
}
