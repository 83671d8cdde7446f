//! CSV file data adapter.
//!
//! One file per symbol at `<dir>/<SYMBOL>.csv`, header row first. Column
//! naming is left to the series store, so exports from most vendors load
//! without conversion.

use crate::domain::error::SigtraderError;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{DataPort, RawTable};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::debug;

pub const DEFAULT_CSV_DIR: &str = "data";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Directory from `[csv] dir`, defaulting to `data`.
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let dir = config
            .get_string("csv", "dir")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CSV_DIR.to_string());
        Self::new(PathBuf::from(dir.trim()))
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_raw(
        &self,
        symbol: &str,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<Option<RawTable>, SigtraderError> {
        let path = self.csv_path(symbol);
        if !path.is_file() {
            debug!(path = %path.display(), "no csv file for symbol");
            return Ok(None);
        }

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| SigtraderError::Database {
                reason: format!("failed to read {}: {}", path.display(), e),
            })?;

        let columns = rdr
            .headers()
            .map_err(|e| SigtraderError::Database {
                reason: format!("CSV header error in {}: {}", path.display(), e),
            })?
            .iter()
            .map(str::to_string)
            .collect();
        let mut table = RawTable::new(columns);

        for result in rdr.records() {
            let record = result.map_err(|e| SigtraderError::Database {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            table.push_row(record.iter().map(str::to_string).collect());
        }

        Ok(Some(table))
    }
}
