//! Notifier that writes messages to the log.

use crate::domain::error::SigtraderError;
use crate::ports::notifier_port::NotifierPort;
use tracing::info;

#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotifierPort for LogNotifier {
    fn notify(&self, message: &str) -> Result<(), SigtraderError> {
        info!(target: "sigtrader::notify", "{message}");
        Ok(())
    }
}
