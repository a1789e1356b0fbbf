// Lighter Grid Bot Library
//
// Keeps a ladder of resting limit orders on the Lighter venue: generates the
// ladder, places it through a retrying signed REST client and re-grids when
// too many orders have gone.

pub mod clients;
pub mod config;
pub mod core;
pub mod error;      // Unified error handling
pub mod validation; // Pre-flight validation

// Re-export core grid types
pub use core::{
    GridLevel, LadderPrecision, LadderSummary, ManagerHandle, OrderLifecycleManager,
    PlacedOrder, RetryPolicy, RunState, Side, StatusSnapshot, StrategyParameters,
};

// Re-export error types
pub use error::{TradingError, TradingResult};

// Re-export validation types
pub use validation::{PreFlightValidator, ValidationCheck, ValidationLevel, ValidationResult};

// Re-export client types
pub use clients::{ApiError, HmacSha256Signer, LighterClient, OpenOrder, RequestSigner};

// Re-export configuration
pub use config::{
    ApiCredentials, ApiSchema, ConfigError, ConfigFile, ConfigStore, EngineSettings,
    FileConfigStore, NetworkSettings,
};
