// Configuration management for the grid bot
//
// The order manager only reads from a `ConfigStore`; setup front-ends use the
// same store to write parameters and arbitrary sections.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::types::{LadderPrecision, StrategyParameters};

pub const DEFAULT_BASE_URL: &str = "https://api.lighter.xyz";

pub const ENV_API_KEY: &str = "LIGHTER_API_KEY";
pub const ENV_API_SECRET: &str = "LIGHTER_API_SECRET";
pub const ENV_BASE_URL: &str = "LIGHTER_BASE_URL";

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCredentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl ApiCredentials {
    /// Both key and secret are filled in
    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }
}

impl Default for ApiCredentials {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            base_url: default_base_url(),
        }
    }
}

// Keep the secret out of logs
impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: f64,
    #[serde(default = "default_pool_size")]
    pub pool_max_idle_per_host: usize,
}

impl NetworkSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.retry_backoff_secs.max(0.0))
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_secs: default_retry_backoff(),
            pool_max_idle_per_host: default_pool_size(),
        }
    }
}

/// Timing and reconciliation knobs of the order manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
    #[serde(default = "default_placement_delay")]
    pub placement_delay_ms: u64,
    /// Pause after a placement fails on connectivity
    #[serde(default = "default_network_cooldown")]
    pub network_cooldown_secs: u64,
    /// Re-grid when open orders drop below this share of the ladder
    #[serde(default = "default_regrid_threshold")]
    pub regrid_threshold: f64,
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,
    #[serde(default = "default_quantity_decimals")]
    pub quantity_decimals: u32,
}

impl EngineSettings {
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn placement_delay(&self) -> Duration {
        Duration::from_millis(self.placement_delay_ms)
    }

    pub fn network_cooldown(&self) -> Duration {
        Duration::from_secs(self.network_cooldown_secs)
    }

    pub fn precision(&self) -> LadderPrecision {
        LadderPrecision {
            price_decimals: self.price_decimals,
            quantity_decimals: self.quantity_decimals,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            monitor_interval_secs: default_monitor_interval(),
            placement_delay_ms: default_placement_delay(),
            network_cooldown_secs: default_network_cooldown(),
            regrid_threshold: default_regrid_threshold(),
            price_decimals: default_price_decimals(),
            quantity_decimals: default_quantity_decimals(),
        }
    }
}

/// Venue paths and response field names.
///
/// The venue API is not final; these keep the client from hard-coding them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSchema {
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_price_field")]
    pub price_field: String,
    #[serde(default = "default_order_id_field")]
    pub order_id_field: String,
    /// Field holding the open-order array; `None` when the body is the array
    #[serde(default)]
    pub orders_field: Option<String>,
}

impl Default for ApiSchema {
    fn default() -> Self {
        Self {
            api_prefix: default_api_prefix(),
            price_field: default_price_field(),
            order_id_field: default_order_id_field(),
            orders_field: None,
        }
    }
}

/// Whole config file, as written by `grid-bot init`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub api: ApiCredentials,
    #[serde(default)]
    pub trading: Option<StrategyParameters>,
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub schema: ApiSchema,
}

impl ConfigFile {
    /// Range checks for the sections that have defaults
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.timeout_secs == 0 {
            return Err(ConfigError::Validation("network.timeout_secs must be greater than 0".to_string()));
        }
        if !(self.network.retry_backoff_secs >= 0.0) {
            return Err(ConfigError::Validation("network.retry_backoff_secs must be non-negative".to_string()));
        }
        if !(self.engine.regrid_threshold > 0.0 && self.engine.regrid_threshold <= 1.0) {
            return Err(ConfigError::Validation("engine.regrid_threshold must be in (0, 1]".to_string()));
        }
        if self.engine.price_decimals > 18 || self.engine.quantity_decimals > 18 {
            return Err(ConfigError::Validation("engine precision must be at most 18 decimals".to_string()));
        }
        Ok(())
    }
}

// Default value functions
fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_timeout() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_backoff() -> f64 { 0.5 }
fn default_pool_size() -> usize { 20 }
fn default_monitor_interval() -> u64 { 60 }
fn default_placement_delay() -> u64 { 100 }
fn default_network_cooldown() -> u64 { 5 }
fn default_regrid_threshold() -> f64 { 0.5 }
fn default_price_decimals() -> u32 { 2 }
fn default_quantity_decimals() -> u32 { 6 }
fn default_api_prefix() -> String { "/api/v1".to_string() }
fn default_price_field() -> String { "price".to_string() }
fn default_order_id_field() -> String { "order_id".to_string() }

/// Source of credentials and trading parameters
pub trait ConfigStore: Send + Sync {
    fn credentials(&self) -> Result<ApiCredentials, ConfigError>;

    fn trading_parameters(&self) -> Result<Option<StrategyParameters>, ConfigError>;

    fn save_trading_parameters(&self, params: &StrategyParameters) -> Result<(), ConfigError>;

    fn network_settings(&self) -> Result<NetworkSettings, ConfigError>;

    fn engine_settings(&self) -> Result<EngineSettings, ConfigError>;

    fn api_schema(&self) -> Result<ApiSchema, ConfigError>;

    /// Raw top-level section or key, for setup front-ends
    fn load_value(&self, key: &str) -> Result<Option<toml::Value>, ConfigError>;

    fn save_value(&self, key: &str, value: toml::Value) -> Result<(), ConfigError>;
}

/// TOML-file backed store; the file is re-read on every call.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
    use_env: bool,
}

impl FileConfigStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            use_env: true,
        }
    }

    /// Ignore `LIGHTER_*` environment overrides
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Parse and validate the whole file
    pub fn load(&self) -> Result<ConfigFile, ConfigError> {
        if !self.path.exists() {
            return Ok(ConfigFile::default());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| ConfigError::FileRead(format!("{}: {}", self.path.display(), e)))?;
        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file or fail with a hint to run `grid-bot init`
    pub fn load_or_error(&self) -> Result<ConfigFile, ConfigError> {
        if !self.path.exists() {
            return Err(ConfigError::FileNotFound(self.path.display().to_string()));
        }
        self.load()
    }

    fn load_table(&self) -> Result<toml::Table, ConfigError> {
        if !self.path.exists() {
            return Ok(toml::Table::new());
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| ConfigError::FileRead(format!("{}: {}", self.path.display(), e)))?;
        content
            .parse::<toml::Table>()
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn write_table(&self, table: &toml::Table) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(table)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::FileWrite(e.to_string()))?;
        }
        fs::write(&self.path, content).map_err(|e| ConfigError::FileWrite(e.to_string()))
    }

    fn env_override(&self, name: &str) -> Option<String> {
        if !self.use_env {
            return None;
        }
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

impl ConfigStore for FileConfigStore {
    fn credentials(&self) -> Result<ApiCredentials, ConfigError> {
        let mut credentials = self.load()?.api;
        if let Some(key) = self.env_override(ENV_API_KEY) {
            credentials.api_key = key;
        }
        if let Some(secret) = self.env_override(ENV_API_SECRET) {
            credentials.api_secret = secret;
        }
        if let Some(url) = self.env_override(ENV_BASE_URL) {
            credentials.base_url = url;
        }
        Ok(credentials)
    }

    fn trading_parameters(&self) -> Result<Option<StrategyParameters>, ConfigError> {
        Ok(self.load()?.trading)
    }

    fn save_trading_parameters(&self, params: &StrategyParameters) -> Result<(), ConfigError> {
        let value = toml::Value::try_from(params)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        self.save_value("trading", value)
    }

    fn network_settings(&self) -> Result<NetworkSettings, ConfigError> {
        Ok(self.load()?.network)
    }

    fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        Ok(self.load()?.engine)
    }

    fn api_schema(&self) -> Result<ApiSchema, ConfigError> {
        Ok(self.load()?.schema)
    }

    fn load_value(&self, key: &str) -> Result<Option<toml::Value>, ConfigError> {
        Ok(self.load_table()?.get(key).cloned())
    }

    fn save_value(&self, key: &str, value: toml::Value) -> Result<(), ConfigError> {
        let mut table = self.load_table()?;
        table.insert(key.to_string(), value);
        self.write_table(&table)
    }
}

/// Check a decimal given on the command line or in a setup form
pub fn parse_positive_decimal(name: &str, raw: &str) -> Result<Decimal, ConfigError> {
    let value: Decimal = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{} must be a number, got '{}'", name, raw)))?;
    if value <= Decimal::ZERO {
        return Err(ConfigError::Validation(format!("{} must be positive", name)));
    }
    Ok(value)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
