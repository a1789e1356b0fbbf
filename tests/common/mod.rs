// Common test utilities and helpers
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use lighter_grid_bot::{
    ApiCredentials, ApiSchema, FileConfigStore, LighterClient, NetworkSettings, RetryPolicy,
    StrategyParameters,
};
use rust_decimal_macros::dec;
use tempfile::TempDir;

pub const TEST_API_KEY: &str = "test-key";
pub const TEST_API_SECRET: &str = "test-secret";

/// 100..120 in 4 grids, 50 per order
pub fn test_params() -> StrategyParameters {
    StrategyParameters {
        symbol: "BTC/USDT".to_string(),
        lower_price: dec!(100),
        upper_price: dec!(120),
        grid_count: 4,
        leverage: 2,
        order_notional: dec!(50),
    }
}

pub fn test_credentials(base_url: &str) -> ApiCredentials {
    ApiCredentials {
        api_key: TEST_API_KEY.to_string(),
        api_secret: TEST_API_SECRET.to_string(),
        base_url: base_url.to_string(),
    }
}

/// Client with no pacing between retries worth waiting for
pub fn test_client(base_url: &str, max_retries: u32) -> LighterClient {
    LighterClient::new(
        &test_credentials(base_url),
        &NetworkSettings::default(),
        ApiSchema::default(),
    )
    .expect("Failed to build client")
    .with_retry_policy(RetryPolicy::new(max_retries, Duration::from_millis(1)))
}

/// Full config file pointing at `base_url`, tuned so tests never sleep long
pub fn test_config_toml(base_url: &str) -> String {
    format!(
        r#"[api]
api_key = "{key}"
api_secret = "{secret}"
base_url = "{base_url}"

[trading]
symbol = "BTC/USDT"
lower_price = "100"
upper_price = "120"
grid_count = 4
leverage = 2
order_notional = "50"

[network]
timeout_secs = 5
max_retries = 1
retry_backoff_secs = 0.001

[engine]
monitor_interval_secs = 1
placement_delay_ms = 0
network_cooldown_secs = 0
regrid_threshold = 0.5
"#,
        key = TEST_API_KEY,
        secret = TEST_API_SECRET,
        base_url = base_url,
    )
}

/// Write `content` to a temp config file; keep the TempDir alive for the test
pub fn write_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, content).expect("Failed to write config file");
    (temp_dir, path)
}

/// Store over a fresh test config, ignoring LIGHTER_* variables
pub fn test_store(base_url: &str) -> (TempDir, FileConfigStore) {
    let (temp_dir, path) = write_config(&test_config_toml(base_url));
    (temp_dir, FileConfigStore::new(path).without_env())
}
