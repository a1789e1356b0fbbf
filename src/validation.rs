//! Pre-flight validation for the grid bot
//!
//! Checks credentials and grid parameters before any order reaches the venue.
//! Critical failures stop a run; warnings mirror the sanity prompts of the
//! setup flow (very dense grids, high leverage, tiny orders).

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::config::{ApiCredentials, ConfigStore, EngineSettings, NetworkSettings};
use crate::core::price_ladder;
use crate::core::types::StrategyParameters;

pub const MAX_COMFORTABLE_GRID_COUNT: u32 = 100;
pub const MAX_COMFORTABLE_LEVERAGE: u32 = 10;
pub const MIN_COMFORTABLE_NOTIONAL: i64 = 10;

/// Validation result with detailed findings
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub passed: bool,
    pub checks: Vec<ValidationCheck>,
}

#[derive(Debug, Clone)]
pub struct ValidationCheck {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub level: ValidationLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Critical, // Must pass for the run to start
    Warning,  // Worth a second look, run can continue
    Info,
}

impl ValidationCheck {
    fn pass(name: &str, message: impl Into<String>, level: ValidationLevel) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: message.into(),
            level,
        }
    }

    fn fail(name: &str, message: impl Into<String>, level: ValidationLevel) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: message.into(),
            level,
        }
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        ValidationResult {
            passed: true,
            checks: Vec::new(),
        }
    }

    pub fn add_check(&mut self, check: ValidationCheck) {
        if !check.passed && check.level == ValidationLevel::Critical {
            self.passed = false;
        }
        self.checks.push(check);
    }

    pub fn critical_failures(&self) -> Vec<&ValidationCheck> {
        self.checks
            .iter()
            .filter(|c| !c.passed && c.level == ValidationLevel::Critical)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&ValidationCheck> {
        self.checks
            .iter()
            .filter(|c| !c.passed && c.level == ValidationLevel::Warning)
            .collect()
    }

    /// One line per critical failure, for error messages
    pub fn failure_summary(&self) -> String {
        self.critical_failures()
            .iter()
            .map(|c| format!("{}: {}", c.name, c.message))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn display(&self) {
        info!("🔍 Pre-flight Validation");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        for check in &self.checks {
            let icon = if check.passed {
                "✅"
            } else {
                match check.level {
                    ValidationLevel::Critical => "❌",
                    ValidationLevel::Warning => "⚠️",
                    ValidationLevel::Info => "ℹ️",
                }
            };

            info!("{} {} - {}", icon, check.name, check.message);
        }

        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if !self.passed {
            let failures = self.critical_failures();
            error!("❌ Validation failed: {} critical issue(s)", failures.len());
            for failure in failures {
                error!("   • {}: {}", failure.name, failure.message);
            }
        } else {
            let warnings = self.warnings();
            if !warnings.is_empty() {
                warn!("⚠️  {} warning(s) detected", warnings.len());
                for warning in warnings {
                    warn!("   • {}: {}", warning.name, warning.message);
                }
            }
            info!("✅ All critical checks passed");
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-flight validator for grid runs
pub struct PreFlightValidator;

impl PreFlightValidator {
    /// Read everything from `store` and validate it
    pub fn validate_store(store: &dyn ConfigStore) -> ValidationResult {
        let mut result = ValidationResult::new();

        let loaded = store.credentials().and_then(|credentials| {
            Ok((
                credentials,
                store.trading_parameters()?,
                store.network_settings()?,
                store.engine_settings()?,
            ))
        });

        match loaded {
            Ok((credentials, params, network, engine)) => {
                result.add_check(ValidationCheck::pass("Config file", "loaded", ValidationLevel::Info));
                for check in Self::checks(&credentials, params.as_ref(), &network, &engine) {
                    result.add_check(check);
                }
            }
            Err(e) => {
                result.add_check(ValidationCheck::fail(
                    "Config file",
                    e.to_string(),
                    ValidationLevel::Critical,
                ));
            }
        }

        result
    }

    /// Validate already-loaded settings
    pub fn validate(
        credentials: &ApiCredentials,
        params: Option<&StrategyParameters>,
        network: &NetworkSettings,
        engine: &EngineSettings,
    ) -> ValidationResult {
        let mut result = ValidationResult::new();
        for check in Self::checks(credentials, params, network, engine) {
            result.add_check(check);
        }
        result
    }

    fn checks(
        credentials: &ApiCredentials,
        params: Option<&StrategyParameters>,
        network: &NetworkSettings,
        engine: &EngineSettings,
    ) -> Vec<ValidationCheck> {
        let mut checks = vec![Self::check_credentials(credentials), Self::check_base_url(credentials)];

        match params {
            Some(params) => checks.extend(Self::check_parameters(params, engine)),
            None => checks.push(ValidationCheck::fail(
                "Trading parameters",
                "no [trading] section configured",
                ValidationLevel::Critical,
            )),
        }

        checks.push(ValidationCheck::pass(
            "Network",
            format!(
                "timeout {}s, {} retries, {:.2}s backoff",
                network.timeout_secs, network.max_retries, network.retry_backoff_secs
            ),
            ValidationLevel::Info,
        ));
        checks
    }

    fn check_credentials(credentials: &ApiCredentials) -> ValidationCheck {
        if credentials.is_complete() {
            ValidationCheck::pass("API credentials", "configured", ValidationLevel::Critical)
        } else {
            ValidationCheck::fail(
                "API credentials",
                "api_key and api_secret must both be set",
                ValidationLevel::Critical,
            )
        }
    }

    fn check_base_url(credentials: &ApiCredentials) -> ValidationCheck {
        let url = credentials.base_url.as_str();
        if url.starts_with("https://") {
            ValidationCheck::pass("Base URL", url, ValidationLevel::Warning)
        } else if url.starts_with("http://") {
            ValidationCheck::fail(
                "Base URL",
                format!("{} is not using TLS", url),
                ValidationLevel::Warning,
            )
        } else {
            ValidationCheck::fail(
                "Base URL",
                format!("'{}' is not an http(s) URL", url),
                ValidationLevel::Critical,
            )
        }
    }

    /// Checks on the grid itself; pure, used by setup front-ends too
    pub fn check_parameters(params: &StrategyParameters, engine: &EngineSettings) -> Vec<ValidationCheck> {
        let mut checks = Vec::new();

        match price_ladder::validate(params, &engine.precision()) {
            Ok(()) => checks.push(ValidationCheck::pass(
                "Grid parameters",
                format!(
                    "{} {}..{} in {} grids",
                    params.symbol, params.lower_price, params.upper_price, params.grid_count
                ),
                ValidationLevel::Critical,
            )),
            Err(e) => checks.push(ValidationCheck::fail(
                "Grid parameters",
                e.to_string(),
                ValidationLevel::Critical,
            )),
        }

        if !params.symbol.contains('/') {
            checks.push(ValidationCheck::fail(
                "Symbol",
                format!("'{}' is not in BASE/QUOTE form (e.g. BTC/USDT)", params.symbol),
                ValidationLevel::Warning,
            ));
        }

        if params.grid_count > MAX_COMFORTABLE_GRID_COUNT {
            checks.push(ValidationCheck::fail(
                "Grid count",
                format!(
                    "{} grids will place many orders (more than {})",
                    params.grid_count, MAX_COMFORTABLE_GRID_COUNT
                ),
                ValidationLevel::Warning,
            ));
        }

        if params.leverage > MAX_COMFORTABLE_LEVERAGE {
            checks.push(ValidationCheck::fail(
                "Leverage",
                format!("{}x is above {}x", params.leverage, MAX_COMFORTABLE_LEVERAGE),
                ValidationLevel::Warning,
            ));
        }

        if params.order_notional < Decimal::from(MIN_COMFORTABLE_NOTIONAL) {
            checks.push(ValidationCheck::fail(
                "Order notional",
                format!(
                    "{} per grid is below {}",
                    params.order_notional, MIN_COMFORTABLE_NOTIONAL
                ),
                ValidationLevel::Warning,
            ));
        }

        checks
    }
}
