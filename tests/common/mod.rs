#![allow(dead_code)]

use chrono::NaiveDate;
use sigtrader::domain::backtest::{BacktestConfig, TradeRecord};
use sigtrader::domain::data_source::DataSource;
use sigtrader::domain::error::SigtraderError;
pub use sigtrader::domain::ohlcv::OhlcvBar;
use sigtrader::domain::ohlcv::Series;
use sigtrader::ports::data_port::{DataPort, RawTable};
use sigtrader::ports::results_port::ResultsPort;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
    pub calls: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_raw(
        &self,
        symbol: &str,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<Option<RawTable>, SigtraderError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SigtraderError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(symbol).map(|bars| to_table(bars)))
    }
}

pub fn to_table(bars: &[OhlcvBar]) -> RawTable {
    let mut table = RawTable::new(
        ["date", "open", "high", "low", "close", "volume"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    for b in bars {
        table.push_row(vec![
            b.date.format("%Y-%m-%d").to_string(),
            b.open.to_string(),
            b.high.to_string(),
            b.low.to_string(),
            b.close.to_string(),
            b.volume.to_string(),
        ]);
    }
    table
}

/// Results sink that keeps every write in memory.
#[derive(Default)]
pub struct MemoryResults {
    pub writes: RefCell<Vec<(String, Vec<TradeRecord>)>>,
    pub fail: bool,
}

impl ResultsPort for MemoryResults {
    fn write(&self, strategy: &str, records: &[TradeRecord]) -> Result<PathBuf, SigtraderError> {
        if self.fail {
            return Err(SigtraderError::Persistence {
                path: format!("memory://{strategy}"),
                reason: "disk full".into(),
            });
        }
        self.writes
            .borrow_mut()
            .push((strategy.to_string(), records.to_vec()));
        Ok(PathBuf::from(format!("memory://{strategy}")))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(symbol: &str, date: &str, close: f64, volume: f64) -> OhlcvBar {
    OhlcvBar {
        symbol: symbol.to_string(),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume,
    }
}

/// Consecutive daily bars with the given closes and volumes. High and low
/// sit one unit either side of the close.
pub fn bars_from(symbol: &str, start: NaiveDate, closes: &[f64], volumes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| OhlcvBar {
            symbol: symbol.to_string(),
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume,
        })
        .collect()
}

pub fn generate_bars(symbol: &str, start_date: &str, count: usize, start_price: f64) -> Vec<OhlcvBar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    (0..count)
        .map(|i| OhlcvBar {
            symbol: symbol.to_string(),
            date: start + chrono::Duration::days(i as i64),
            open: start_price + i as f64,
            high: start_price + i as f64 + 1.0,
            low: start_price + i as f64 - 1.0,
            close: start_price + i as f64,
            volume: 1000.0,
        })
        .collect()
}

pub fn series_map(series: Vec<Series>) -> BTreeMap<String, Series> {
    series
        .into_iter()
        .map(|s| (s.symbol().to_string(), s))
        .collect()
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        strategy: "volume_breakout".into(),
        start_date: date(2024, 1, 1),
        end_date: date(2024, 12, 31),
        lookback_days: 3,
        profit_pct: 0.05,
        loss_pct: 0.03,
        horizon_bars: 14,
        data_source: DataSource::Csv,
        volume_multiplier: 2.0,
        max_tickers: None,
    }
}
