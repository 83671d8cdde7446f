//! SQLite trade ledger.

use crate::adapters::sqlite_adapter::{memory_pool, pool_err, pool_from_config, query_err};
use crate::domain::error::SigtraderError;
use crate::domain::position::{Environment, Holding, LedgerEntry, TradeStatus};
use crate::domain::signal::Action;
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerPort;
use chrono::NaiveDateTime;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};
use std::path::Path;

pub const DEFAULT_LEDGER_PATH: &str = "logs/trades.db";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteLedger {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteLedger {
    /// Open `[ledger] path` (default `logs/trades.db`), creating the parent
    /// directory and schema when missing.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SigtraderError> {
        let path = config
            .get_string("ledger", "path")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LEDGER_PATH.to_string());
        if let Some(parent) = Path::new(path.trim()).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let ledger = Self {
            pool: pool_from_config(config, "ledger", Some(&path))?,
        };
        ledger.initialize_schema()?;
        Ok(ledger)
    }

    pub fn in_memory() -> Result<Self, SigtraderError> {
        let ledger = Self {
            pool: memory_pool()?,
        };
        ledger.initialize_schema()?;
        Ok(ledger)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SigtraderError> {
        self.pool.get().map_err(pool_err)
    }

    fn initialize_schema(&self) -> Result<(), SigtraderError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS trades (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp TEXT NOT NULL,
                    symbol TEXT NOT NULL,
                    action TEXT NOT NULL,
                    quantity INTEGER NOT NULL,
                    price REAL NOT NULL,
                    strategy TEXT NOT NULL,
                    env TEXT NOT NULL,
                    status TEXT NOT NULL,
                    notes TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_trades_open ON trades(strategy, env, status);",
            )
            .map_err(query_err)
    }

    /// Every ledger row in insertion order.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>, SigtraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, symbol, action, quantity, price, strategy, env, status, notes
                 FROM trades ORDER BY id ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, Option<String>>(8)?,
                ))
            })
            .map_err(query_err)?;

        let mut out = Vec::new();
        for row in rows {
            let (ts, symbol, action, quantity, price, strategy, env, status, notes) =
                row.map_err(query_err)?;
            out.push(LedgerEntry {
                timestamp: parse_timestamp(&ts)?,
                symbol,
                action: decode("action", &action, &[Action::Buy, Action::Sell], Action::as_str)?,
                quantity,
                price,
                strategy,
                env: decode(
                    "env",
                    &env,
                    &[Environment::Paper, Environment::Live],
                    Environment::as_str,
                )?,
                status: decode(
                    "status",
                    &status,
                    &[TradeStatus::Executed, TradeStatus::Closed],
                    TradeStatus::as_str,
                )?,
                notes,
            });
        }
        Ok(out)
    }
}

/// Map a stored label back to the variant whose `as_str` produced it.
fn decode<T: Copy>(
    column: &str,
    raw: &str,
    variants: &[T],
    as_str: fn(&T) -> &'static str,
) -> Result<T, SigtraderError> {
    variants
        .iter()
        .copied()
        .find(|v| as_str(v) == raw)
        .ok_or_else(|| SigtraderError::DatabaseQuery {
            reason: format!("unknown {column} {raw:?} in trades"),
        })
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, SigtraderError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|e| {
        SigtraderError::DatabaseQuery {
            reason: format!("invalid timestamp {raw:?}: {e}"),
        }
    })
}

fn insert_entry(conn: &Connection, entry: &LedgerEntry) -> Result<(), SigtraderError> {
    conn.execute(
        "INSERT INTO trades (timestamp, symbol, action, quantity, price, strategy, env, status, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            entry.symbol,
            entry.action.as_str(),
            entry.quantity,
            entry.price,
            entry.strategy,
            entry.env.as_str(),
            entry.status.as_str(),
            entry.notes
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

impl LedgerPort for SqliteLedger {
    fn record(&self, entry: &LedgerEntry) -> Result<(), SigtraderError> {
        insert_entry(&*self.conn()?, entry)
    }

    fn open_positions(&self, strategy: &str, env: Environment) -> Result<Vec<Holding>, SigtraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, quantity, price, timestamp
                 FROM trades
                 WHERE strategy = ?1 AND env = ?2 AND action = ?3 AND status = ?4
                 ORDER BY id ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(
                params![
                    strategy,
                    env.as_str(),
                    Action::Buy.as_str(),
                    TradeStatus::Executed.as_str()
                ],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .map_err(query_err)?;

        let mut holdings = Vec::new();
        for row in rows {
            let (symbol, quantity, entry_price, ts) = row.map_err(query_err)?;
            holdings.push(Holding {
                symbol,
                quantity,
                entry_price,
                timestamp: parse_timestamp(&ts)?,
            });
        }
        Ok(holdings)
    }

    fn record_exit(
        &self,
        sell: &LedgerEntry,
        route: &mut dyn FnMut() -> Result<(), SigtraderError>,
    ) -> Result<usize, SigtraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let closed = tx
            .execute(
                "UPDATE trades SET status = ?1
                 WHERE strategy = ?2 AND symbol = ?3 AND env = ?4 AND action = ?5 AND status = ?6",
                params![
                    TradeStatus::Closed.as_str(),
                    sell.strategy,
                    sell.symbol,
                    sell.env.as_str(),
                    Action::Buy.as_str(),
                    TradeStatus::Executed.as_str()
                ],
            )
            .map_err(query_err)?;
        insert_entry(&tx, sell)?;

        // Dropping `tx` on any error below rolls both writes back.
        route()?;
        tx.commit().map_err(query_err)?;
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(symbol: &str, action: Action, env: Environment) -> LedgerEntry {
        LedgerEntry {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(15, 59, 0)
                .unwrap(),
            symbol: symbol.into(),
            action,
            quantity: 1,
            price: 187.5,
            strategy: "volume_breakout".into(),
            env,
            status: TradeStatus::Executed,
            notes: Some("volume spike".into()),
        }
    }

    #[test]
    fn record_and_read_back() {
        let ledger = SqliteLedger::in_memory().unwrap();
        let e = entry("AAPL", Action::Buy, Environment::Paper);
        ledger.record(&e).unwrap();
        assert_eq!(ledger.entries().unwrap(), vec![e]);
    }

    #[test]
    fn open_positions_filter_by_strategy_env_and_status() {
        let ledger = SqliteLedger::in_memory().unwrap();
        ledger.record(&entry("AAPL", Action::Buy, Environment::Paper)).unwrap();
        ledger.record(&entry("MSFT", Action::Buy, Environment::Live)).unwrap();
        ledger.record(&entry("TSLA", Action::Sell, Environment::Paper)).unwrap();

        let open = ledger.open_positions("volume_breakout", Environment::Paper).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].symbol, "AAPL");
        assert_eq!(open[0].entry_price, 187.5);
        assert!(ledger.open_positions("other", Environment::Paper).unwrap().is_empty());
    }

    fn sell(symbol: &str) -> LedgerEntry {
        LedgerEntry {
            status: TradeStatus::Closed,
            price: 190.0,
            ..entry(symbol, Action::Sell, Environment::Paper)
        }
    }

    #[test]
    fn record_exit_writes_sell_and_closes_buys() {
        let ledger = SqliteLedger::in_memory().unwrap();
        ledger.record(&entry("AAPL", Action::Buy, Environment::Paper)).unwrap();
        ledger.record(&entry("AAPL", Action::Buy, Environment::Paper)).unwrap();
        ledger.record(&entry("MSFT", Action::Buy, Environment::Paper)).unwrap();

        let mut routed = 0;
        let n = ledger
            .record_exit(&sell("AAPL"), &mut || {
                routed += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(routed, 1);

        let open = ledger.open_positions("volume_breakout", Environment::Paper).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].symbol, "MSFT");
        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[3], sell("AAPL"));
    }

    #[test]
    fn record_exit_rolls_back_when_routing_fails() {
        let ledger = SqliteLedger::in_memory().unwrap();
        ledger.record(&entry("AAPL", Action::Buy, Environment::Paper)).unwrap();
        let before = ledger.entries().unwrap();

        let err = ledger
            .record_exit(&sell("AAPL"), &mut || {
                Err(SigtraderError::Broker {
                    symbol: "AAPL".into(),
                    reason: "rejected".into(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, SigtraderError::Broker { .. }));
        assert_eq!(ledger.entries().unwrap(), before);
        assert_eq!(
            ledger.open_positions("volume_breakout", Environment::Paper).unwrap().len(),
            1
        );
    }

    #[test]
    fn entries_reject_unknown_labels() {
        let ledger = SqliteLedger::in_memory().unwrap();
        ledger.record(&entry("AAPL", Action::Buy, Environment::Paper)).unwrap();
        ledger
            .conn()
            .unwrap()
            .execute("UPDATE trades SET action = 'short'", [])
            .unwrap();
        let err = ledger.entries().unwrap_err();
        assert!(matches!(err, SigtraderError::DatabaseQuery { ref reason } if reason.contains("short")));

        ledger
            .conn()
            .unwrap()
            .execute("UPDATE trades SET action = 'buy', status = 'pending'", [])
            .unwrap();
        let err = ledger.entries().unwrap_err();
        assert!(matches!(err, SigtraderError::DatabaseQuery { ref reason } if reason.contains("pending")));
    }

    #[test]
    fn from_config_creates_parent_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("trades.db");
        let cfg = crate::adapters::file_config_adapter::FileConfigAdapter::from_string(&format!(
            "[ledger]\npath = {}\n",
            path.display()
        ))
        .unwrap();
        let ledger = SqliteLedger::from_config(&cfg).unwrap();
        ledger.record(&entry("AAPL", Action::Buy, Environment::Paper)).unwrap();
        assert!(path.exists());
    }
}
