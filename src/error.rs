//! Unified error handling for the grid bot
//!
//! Client and config modules keep their own `thiserror` enums at the seam;
//! everything the manager and the CLI see is a `TradingError`.

use std::fmt;
use std::io;

use crate::clients::ApiError;
use crate::config::ConfigError;
use crate::core::{ErrorClass, RetryableError, RunState};

/// Main error type for the grid bot
#[derive(Debug)]
pub enum TradingError {
    // Configuration errors
    ConfigNotFound(String),
    ConfigParse(String),
    ConfigValidation(String),
    ConfigMissing(String),

    // API errors
    ApiConnection(String),
    ApiTimeout(String),
    ApiAuthentication(String),
    ApiRateLimit(String),
    ApiResponse(String),
    RetriesExhausted(String),

    // Validation errors
    InvalidParameter(String, String), // (parameter_name, reason)

    // Order errors
    OrderRejected(String),

    // Lifecycle errors
    InvalidStateTransition(RunState, RunState),
    NotInitialized,

    // IO errors
    FileRead(String),
    FileWrite(String),

    Internal(String),
}

impl TradingError {
    /// Get a user-friendly error message with helpful context
    pub fn user_message(&self) -> String {
        match self {
            TradingError::ConfigNotFound(path) => {
                format!(
                    "Configuration file not found: {}\n\n\
                    💡 Quick fix:\n\
                    1. Run: grid-bot init\n\
                    2. Edit config.toml with your API keys and grid parameters\n\
                    3. Try again",
                    path
                )
            }
            TradingError::ConfigMissing(what) => {
                format!(
                    "Missing required configuration: {}\n\n\
                    💡 Quick fix:\n\
                    1. Run: grid-bot init\n\
                    2. Fill in [api] and [trading] in config.toml\n\
                    3. Check it with: grid-bot check",
                    what
                )
            }
            TradingError::ConfigValidation(msg) => {
                format!(
                    "Configuration validation error: {}\n\n\
                    💡 Check config.toml for:\n\
                    - lower_price < upper_price, both positive\n\
                    - grid_count of at least 2\n\
                    - a positive order_notional",
                    msg
                )
            }
            TradingError::ApiAuthentication(msg) => {
                format!(
                    "API authentication failed: {}\n\n\
                    💡 Check:\n\
                    - API key is correct\n\
                    - API secret is correct\n\
                    - Keys have trading permissions\n\
                    - base_url points at the right venue",
                    msg
                )
            }
            TradingError::ApiRateLimit(msg) => {
                format!(
                    "API rate limit exceeded: {}\n\n\
                    💡 Please wait before retrying",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Transient failures the next monitoring tick may recover from
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TradingError::ApiTimeout(_)
                | TradingError::ApiConnection(_)
                | TradingError::ApiRateLimit(_)
                | TradingError::RetriesExhausted(_)
        )
    }

    /// Errors that end the process before any network activity
    pub fn is_config_error(&self) -> bool {
        self.category() == "config"
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TradingError::ConfigNotFound(_)
            | TradingError::ConfigParse(_)
            | TradingError::ConfigValidation(_)
            | TradingError::ConfigMissing(_) => "config",

            TradingError::ApiConnection(_)
            | TradingError::ApiTimeout(_)
            | TradingError::ApiAuthentication(_)
            | TradingError::ApiRateLimit(_)
            | TradingError::ApiResponse(_)
            | TradingError::RetriesExhausted(_) => "api",

            TradingError::InvalidParameter(_, _) => "validation",

            TradingError::OrderRejected(_) => "trading",

            TradingError::InvalidStateTransition(_, _) | TradingError::NotInitialized => {
                "lifecycle"
            }

            TradingError::FileRead(_) | TradingError::FileWrite(_) => "io",

            TradingError::Internal(_) => "internal",
        }
    }
}

impl fmt::Display for TradingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path)
            }
            TradingError::ConfigParse(msg) => {
                write!(f, "Configuration parse error: {}", msg)
            }
            TradingError::ConfigValidation(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }
            TradingError::ConfigMissing(field) => {
                write!(f, "Missing required configuration: {}", field)
            }

            TradingError::ApiConnection(msg) => {
                write!(f, "API connection error: {}", msg)
            }
            TradingError::ApiTimeout(msg) => {
                write!(f, "API timeout: {}", msg)
            }
            TradingError::ApiAuthentication(msg) => {
                write!(f, "API authentication failed: {}", msg)
            }
            TradingError::ApiRateLimit(msg) => {
                write!(f, "API rate limit exceeded: {}", msg)
            }
            TradingError::ApiResponse(msg) => {
                write!(f, "API response error: {}", msg)
            }
            TradingError::RetriesExhausted(msg) => {
                write!(f, "Retries exhausted: {}", msg)
            }

            TradingError::InvalidParameter(param, reason) => {
                write!(f, "Invalid parameter '{}': {}", param, reason)
            }

            TradingError::OrderRejected(msg) => {
                write!(f, "Order rejected: {}", msg)
            }

            TradingError::InvalidStateTransition(from, to) => {
                write!(f, "Invalid state transition: {} -> {}", from, to)
            }
            TradingError::NotInitialized => {
                write!(f, "Order manager is not initialized")
            }

            TradingError::FileRead(msg) => {
                write!(f, "File read error: {}", msg)
            }
            TradingError::FileWrite(msg) => {
                write!(f, "File write error: {}", msg)
            }

            TradingError::Internal(msg) => {
                write!(f, "Internal error: {}", msg)
            }
        }
    }
}

impl std::error::Error for TradingError {}

// Conversion implementations for common error types

impl From<ApiError> for TradingError {
    fn from(err: ApiError) -> Self {
        let msg = err.to_string();
        match &err {
            ApiError::RetriesExhausted { .. } => TradingError::RetriesExhausted(msg),
            ApiError::Timeout(_) => TradingError::ApiTimeout(msg),
            ApiError::Connection(_) => TradingError::ApiConnection(msg),
            ApiError::Http { status: 401 | 403, .. } => TradingError::ApiAuthentication(msg),
            ApiError::Http { status: 429, .. } => TradingError::ApiRateLimit(msg),
            _ if err.class() == ErrorClass::ClientRequest => TradingError::OrderRejected(msg),
            _ => TradingError::ApiResponse(msg),
        }
    }
}

impl From<ConfigError> for TradingError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::FileNotFound(path) => TradingError::ConfigNotFound(path),
            ConfigError::FileRead(msg) => TradingError::FileRead(msg),
            ConfigError::FileWrite(msg) => TradingError::FileWrite(msg),
            ConfigError::Parse(msg) => TradingError::ConfigParse(msg),
            ConfigError::Serialize(msg) => TradingError::Internal(msg),
            ConfigError::Validation(msg) => TradingError::ConfigValidation(msg),
        }
    }
}

impl From<io::Error> for TradingError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => TradingError::ConfigNotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => TradingError::FileRead(err.to_string()),
            _ => TradingError::Internal(format!("IO error: {}", err)),
        }
    }
}

impl From<serde_json::Error> for TradingError {
    fn from(err: serde_json::Error) -> Self {
        TradingError::ApiResponse(format!("JSON parse error: {}", err))
    }
}

impl From<toml::de::Error> for TradingError {
    fn from(err: toml::de::Error) -> Self {
        TradingError::ConfigParse(format!("TOML parse error: {}", err))
    }
}

impl From<reqwest::Error> for TradingError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::from(err).into()
    }
}

impl From<String> for TradingError {
    fn from(msg: String) -> Self {
        TradingError::Internal(msg)
    }
}

impl From<&str> for TradingError {
    fn from(msg: &str) -> Self {
        TradingError::Internal(msg.to_string())
    }
}

/// Result type alias using TradingError
pub type TradingResult<T> = Result<T, TradingError>;
