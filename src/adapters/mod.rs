//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_results_adapter;
pub mod file_config_adapter;
pub mod log_notifier;
pub mod paper_broker;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_ledger;

use crate::domain::data_source::DataSource;
use crate::domain::error::SigtraderError;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

/// Construct the provider registered under `source`.
pub fn open_data_port(
    source: DataSource,
    config: &dyn ConfigPort,
) -> Result<Box<dyn DataPort>, SigtraderError> {
    match source {
        DataSource::Csv => Ok(Box::new(csv_adapter::CsvAdapter::from_config(config))),
        #[cfg(feature = "sqlite")]
        DataSource::Sqlite => Ok(Box::new(sqlite_adapter::SqliteAdapter::from_config(config)?)),
        #[cfg(not(feature = "sqlite"))]
        DataSource::Sqlite => Err(SigtraderError::invalid_config(
            "backtest",
            "data_source",
            "sqlite support not compiled in (enable the sqlite feature)",
        )),
    }
}
