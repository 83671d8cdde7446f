//! Live trade ledger port.

use crate::domain::error::SigtraderError;
use crate::domain::position::{Environment, Holding, LedgerEntry};

pub trait LedgerPort {
    fn record(&self, entry: &LedgerEntry) -> Result<(), SigtraderError>;

    /// Buys for `strategy` in `env` that have not been closed.
    fn open_positions(&self, strategy: &str, env: Environment) -> Result<Vec<Holding>, SigtraderError>;

    /// Record `sell` and mark every open buy of its symbol closed as one unit.
    ///
    /// `route` places the order inside that unit. If it fails, or either
    /// write fails, the ledger is left unchanged. Returns the number of buys
    /// closed.
    fn record_exit(
        &self,
        sell: &LedgerEntry,
        route: &mut dyn FnMut() -> Result<(), SigtraderError>,
    ) -> Result<usize, SigtraderError>;
}
