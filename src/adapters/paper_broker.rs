//! Paper broker: fills at the latest close on or before the as-of date.

use crate::domain::error::SigtraderError;
use crate::domain::series_store::SeriesStore;
use crate::ports::broker_port::{BrokerPort, Order, OrderAck};
use crate::ports::data_port::DataPort;
use chrono::{Duration, NaiveDate};
use std::cell::RefCell;
use tracing::info;

/// Calendar days searched backwards for a quote.
const QUOTE_LOOKBACK_DAYS: i64 = 10;

pub struct PaperBroker<'a> {
    data: &'a dyn DataPort,
    as_of: NaiveDate,
    orders: RefCell<Vec<OrderAck>>,
}

impl<'a> PaperBroker<'a> {
    pub fn new(data: &'a dyn DataPort, as_of: NaiveDate) -> Self {
        Self {
            data,
            as_of,
            orders: RefCell::new(Vec::new()),
        }
    }

    /// Orders accepted so far, oldest first.
    pub fn orders(&self) -> Vec<OrderAck> {
        self.orders.borrow().clone()
    }
}

impl BrokerPort for PaperBroker<'_> {
    fn latest_price(&self, symbol: &str) -> Result<f64, SigtraderError> {
        let start = self.as_of - Duration::days(QUOTE_LOOKBACK_DAYS);
        let series = SeriesStore::new(self.data).fetch(&[symbol.to_string()], start, self.as_of)?;
        series
            .get(symbol)
            .and_then(|s| s.last())
            .map(|bar| bar.close)
            .ok_or_else(|| SigtraderError::Broker {
                symbol: symbol.to_string(),
                reason: format!("no price on or before {}", self.as_of),
            })
    }

    fn submit_order(&self, order: &Order) -> Result<OrderAck, SigtraderError> {
        if order.quantity <= 0 {
            return Err(SigtraderError::Broker {
                symbol: order.symbol.clone(),
                reason: format!("invalid quantity {}", order.quantity),
            });
        }
        let mut orders = self.orders.borrow_mut();
        let ack = OrderAck {
            order_id: format!("paper-{}", orders.len() + 1),
            symbol: order.symbol.clone(),
            action: order.action,
            quantity: order.quantity,
        };
        info!(order_id = %ack.order_id, symbol = %ack.symbol, action = %ack.action, quantity = ack.quantity, "paper order filled");
        orders.push(ack.clone());
        Ok(ack)
    }
}
