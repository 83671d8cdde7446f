//! Trade notification port.

use crate::domain::error::SigtraderError;

pub trait NotifierPort {
    fn notify(&self, message: &str) -> Result<(), SigtraderError>;
}
