// Common types used across the application

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side on the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Strategy parameters for one grid run.
///
/// Decimals are stored as strings in TOML so that `100.10` stays `100.10`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParameters {
    pub symbol: String,
    pub lower_price: Decimal,
    pub upper_price: Decimal,
    pub grid_count: u32,
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    /// Nominal value of each grid order, before leverage
    pub order_notional: Decimal,
}

fn default_leverage() -> u32 { 1 }

impl StrategyParameters {
    /// Distance between two adjacent grid lines (unquantized)
    pub fn step(&self) -> Decimal {
        (self.upper_price - self.lower_price) / Decimal::from(self.grid_count)
    }
}

/// Decimal places used when quantizing prices and quantities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderPrecision {
    pub price_decimals: u32,
    pub quantity_decimals: u32,
}

impl Default for LadderPrecision {
    fn default() -> Self {
        Self {
            price_decimals: 2,
            quantity_decimals: 6,
        }
    }
}

/// One resting order the ladder wants on the book
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridLevel {
    pub price: Decimal,
    pub quantity: Decimal,
    pub side: Side,
    /// Position of the grid line in `0..=grid_count`
    pub index: u32,
}

/// A grid level the venue acknowledged with an order id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order_id: String,
    pub level: GridLevel,
}

/// Lifecycle states of the order manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunState {
    Idle,
    Initializing,
    Placing,
    Monitoring,
    Stopping,
    Stopped,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Initializing)
                | (Stopped, Initializing)
                | (Initializing, Placing)
                | (Initializing, Stopping)
                | (Initializing, Stopped) // configuration failure
                | (Placing, Monitoring)
                | (Placing, Stopping)
                | (Monitoring, Placing)
                | (Monitoring, Stopping)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
