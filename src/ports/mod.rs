//! Port traits: the narrow interfaces between the engine and the outside world.

pub mod broker_port;
pub mod config_port;
pub mod data_port;
pub mod ledger_port;
pub mod notifier_port;
pub mod results_port;
