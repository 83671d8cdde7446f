//! SQLite data adapter.
//!
//! Reads daily bars from an `ohlcv` table keyed by `(symbol, date)`.

use crate::domain::error::SigtraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{DataPort, RawTable};
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub(crate) fn pool_err(e: r2d2::Error) -> SigtraderError {
    SigtraderError::Database {
        reason: e.to_string(),
    }
}

pub(crate) fn query_err(e: rusqlite::Error) -> SigtraderError {
    SigtraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

/// Pool over the file named by `[<section>] path`.
pub(crate) fn pool_from_config(
    config: &dyn ConfigPort,
    section: &str,
    default_path: Option<&str>,
) -> Result<Pool<SqliteConnectionManager>, SigtraderError> {
    let db_path = config
        .get_string(section, "path")
        .filter(|s| !s.trim().is_empty())
        .or_else(|| default_path.map(str::to_string))
        .ok_or_else(|| SigtraderError::ConfigMissing {
            section: section.into(),
            key: "path".into(),
        })?;
    let pool_size = config.get_int(section, "pool_size", 4).max(1) as u32;

    let manager = SqliteConnectionManager::file(db_path.trim());
    Pool::builder()
        .max_size(pool_size)
        .build(manager)
        .map_err(pool_err)
}

/// Single-connection pool over a private in-memory database.
pub(crate) fn memory_pool() -> Result<Pool<SqliteConnectionManager>, SigtraderError> {
    Pool::builder()
        .max_size(1)
        .build(SqliteConnectionManager::memory())
        .map_err(pool_err)
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        Ok(Self {
            pool: pool_from_config(config, "sqlite", None)?,
        })
    }

    pub fn in_memory() -> Result<Self, SigtraderError> {
        Ok(Self {
            pool: memory_pool()?,
        })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SigtraderError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), SigtraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS ohlcv (
                    symbol TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume REAL NOT NULL,
                    PRIMARY KEY (symbol, date)
                );
                CREATE INDEX IF NOT EXISTS idx_ohlcv_date ON ohlcv(date);",
            )
            .map_err(query_err)
    }

    pub fn insert_bars(&self, bars: &[OhlcvBar]) -> Result<(), SigtraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv (symbol, date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    bar.symbol,
                    bar.date.format("%Y-%m-%d").to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_raw(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Option<RawTable>, SigtraderError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume
                 FROM ohlcv
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    start_date.format("%Y-%m-%d").to_string(),
                    end_date.format("%Y-%m-%d").to_string()
                ],
                |row| {
                    Ok(vec![
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?.to_string(),
                        row.get::<_, f64>(2)?.to_string(),
                        row.get::<_, f64>(3)?.to_string(),
                        row.get::<_, f64>(4)?.to_string(),
                        row.get::<_, f64>(5)?.to_string(),
                    ])
                },
            )
            .map_err(query_err)?;

        let mut table = RawTable::new(
            ["date", "open", "high", "low", "close", "volume"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        );
        for row in rows {
            table.push_row(row.map_err(query_err)?);
        }

        Ok((!table.is_empty()).then_some(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series_store::SeriesStore;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bar(symbol: &str, date: NaiveDate, close: f64) -> OhlcvBar {
        OhlcvBar {
            symbol: symbol.into(),
            date,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        }
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .insert_bars(&[
                bar("AAPL", d(2024, 1, 3), 101.0),
                bar("AAPL", d(2024, 1, 2), 100.0),
                bar("AAPL", d(2024, 1, 4), 102.0),
                bar("MSFT", d(2024, 1, 2), 300.0),
            ])
            .unwrap();
        adapter
    }

    #[test]
    fn fetch_raw_filters_and_orders() {
        let adapter = seeded();
        let table = adapter
            .fetch_raw("AAPL", d(2024, 1, 2), d(2024, 1, 3))
            .unwrap()
            .unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], "2024-01-02");
        assert_eq!(table.rows[1][4], "101");
    }

    #[test]
    fn fetch_raw_unknown_symbol_is_none() {
        let adapter = seeded();
        assert!(adapter.fetch_raw("TSLA", d(2024, 1, 1), d(2024, 1, 31)).unwrap().is_none());
    }

    #[test]
    fn rows_normalize_into_series() {
        let adapter = seeded();
        let series = SeriesStore::new(&adapter)
            .fetch(&["AAPL".to_string()], d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        let aapl = &series["AAPL"];
        assert_eq!(aapl.len(), 3);
        assert_eq!(aapl.bars()[2].close, 102.0);
        assert_eq!(aapl.bars()[0].volume, 1000.0);
    }

    #[test]
    fn insert_replaces_existing_date() {
        let adapter = seeded();
        adapter.insert_bars(&[bar("AAPL", d(2024, 1, 2), 99.0)]).unwrap();
        let table = adapter
            .fetch_raw("AAPL", d(2024, 1, 2), d(2024, 1, 2))
            .unwrap()
            .unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][4], "99");
    }

    #[test]
    fn from_config_requires_path() {
        let cfg = crate::adapters::file_config_adapter::FileConfigAdapter::from_string("[sqlite]\n").unwrap();
        let err = SqliteAdapter::from_config(&cfg).err().unwrap();
        assert!(matches!(err, SigtraderError::ConfigMissing { .. }));
    }
}
