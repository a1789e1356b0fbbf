// Core grid logic modules

pub mod error_handling;
pub mod lifecycle;
pub mod price_ladder;
pub mod types;

// Re-export commonly used types
pub use error_handling::{ErrorClass, RetryPolicy, RetryableError};
pub use lifecycle::{needs_regrid, ManagerHandle, OrderLifecycleManager, StatusSnapshot};
pub use price_ladder::{generate, summarize, LadderSummary};
pub use types::{GridLevel, LadderPrecision, PlacedOrder, RunState, Side, StrategyParameters};
