//! Trading bot stand-in that records orders instead of placing them.

use std::sync::Mutex;
use std::time::Duration;

use tracing::info;

use crate::domain::error::GatetraderError;
use crate::domain::signal::Direction;
use crate::ports::trading_bot_port::TradingBotPort;

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedOrder {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub size: f64,
}

#[derive(Debug, Default)]
pub struct DryRunBot {
    orders: Mutex<Vec<SubmittedOrder>>,
}

impl DryRunBot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders(&self) -> Vec<SubmittedOrder> {
        self.orders
            .lock()
            .map(|orders| orders.clone())
            .unwrap_or_default()
    }
}

impl TradingBotPort for DryRunBot {
    fn submit_trade(
        &self,
        symbol: &str,
        direction: Direction,
        size: f64,
        _deadline: Duration,
    ) -> Result<String, GatetraderError> {
        let mut orders = self
            .orders
            .lock()
            .map_err(|_| GatetraderError::CollaboratorUnavailable {
                collaborator: "trading bot".to_string(),
                reason: "order book lock poisoned".to_string(),
            })?;
        let id = format!("dry-run-{}", orders.len() + 1);
        info!(%id, symbol, ?direction, size, "dry run: order not sent");
        orders.push(SubmittedOrder {
            id: id.clone(),
            symbol: symbol.to_string(),
            direction,
            size,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_orders_with_sequential_ids() {
        let bot = DryRunBot::new();
        assert_eq!(bot.submit_trade("BTC/ZAR", Direction::Buy, 0.5, Duration::from_secs(1)).unwrap(), "dry-run-1");
        assert_eq!(bot.submit_trade("XRP/ZAR", Direction::Sell, 100.0, Duration::from_secs(1)).unwrap(), "dry-run-2");
        let orders = bot.orders();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[1].symbol, "XRP/ZAR");
        assert_eq!(orders[1].direction, Direction::Sell);
    }
}
