//! Order routing and price quoting port.

use crate::domain::error::SigtraderError;
use crate::domain::signal::Action;

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub symbol: String,
    pub action: Action,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub order_id: String,
    pub symbol: String,
    pub action: Action,
    pub quantity: i64,
}

pub trait BrokerPort {
    fn latest_price(&self, symbol: &str) -> Result<f64, SigtraderError>;

    fn submit_order(&self, order: &Order) -> Result<OrderAck, SigtraderError>;
}
