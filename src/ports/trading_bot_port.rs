//! Port to the external trading bot that places orders.

use std::time::Duration;

use crate::domain::error::GatetraderError;
use crate::domain::signal::Direction;

pub trait TradingBotPort: Send + Sync {
    /// Submits an order and returns the bot's order reference.
    ///
    /// The bot enforces `deadline` itself. `CollaboratorTimeout` means the
    /// order was not placed; once an order is placed the bot must answer
    /// `Ok`, however late.
    fn submit_trade(
        &self,
        symbol: &str,
        direction: Direction,
        size: f64,
        deadline: Duration,
    ) -> Result<String, GatetraderError>;
}
