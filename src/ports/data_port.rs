//! Market data access port.

use crate::domain::error::SigtraderError;
use chrono::NaiveDate;

/// Provider-shaped tabular data, before normalization by the series store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub trait DataPort {
    /// Daily rows for `symbol` between `start_date` and `end_date` inclusive.
    ///
    /// `Ok(None)` means the provider has nothing for this symbol. Providers
    /// may return rows outside the range; the store filters them.
    fn fetch_raw(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Option<RawTable>, SigtraderError>;
}
