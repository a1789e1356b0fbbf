// Config command implementations: init, check, setup, preview
use std::fs;

use tracing::{error, info, warn};

use lighter_grid_bot::config::parse_positive_decimal;
use lighter_grid_bot::core::{generate, summarize};
use lighter_grid_bot::{
    ConfigStore, FileConfigStore, LighterClient, PreFlightValidator, StrategyParameters,
    TradingError, TradingResult, ValidationLevel, ValidationResult,
};

const CONFIG_TEMPLATE: &str = include_str!("../../config.toml.example");

pub fn init_config(store: &FileConfigStore, force: bool) -> TradingResult<()> {
    info!("🔧 Initializing configuration...");

    if store.exists() && !force {
        warn!("⚠️  {} already exists, skipping (use --force to overwrite)", store.path().display());
        return Ok(());
    }

    fs::write(store.path(), CONFIG_TEMPLATE)
        .map_err(|e| TradingError::FileWrite(format!("{}: {}", store.path().display(), e)))?;
    info!("📝 Created {}", store.path().display());

    info!("✅ Configuration initialized!");
    info!("💡 Next steps:");
    info!("   1. Edit {} with your API keys", store.path().display());
    info!("   2. Run: grid-bot setup --symbol BTC/USDT --lower 25000 --upper 30000 --grids 10 --notional 100");
    info!("   3. Run: grid-bot check");
    info!("   4. Run: grid-bot run");
    Ok(())
}

pub fn check_config(store: &FileConfigStore) -> TradingResult<()> {
    crate::require_config(store)?;

    let validation = PreFlightValidator::validate_store(store);
    validation.display();

    if !validation.passed {
        return Err(TradingError::ConfigValidation(validation.failure_summary()));
    }
    Ok(())
}

pub fn setup_grid(
    store: &FileConfigStore,
    symbol: &str,
    lower: &str,
    upper: &str,
    grid_count: u32,
    notional: &str,
    leverage: u32,
) -> TradingResult<()> {
    let params = StrategyParameters {
        symbol: symbol.trim().to_uppercase(),
        lower_price: parse_positive_decimal("lower", lower)?,
        upper_price: parse_positive_decimal("upper", upper)?,
        grid_count,
        leverage,
        order_notional: parse_positive_decimal("notional", notional)?,
    };
    let engine = store.engine_settings()?;

    let mut validation = ValidationResult::new();
    for check in PreFlightValidator::check_parameters(&params, &engine) {
        validation.add_check(check);
    }
    validation.display();
    if !validation.passed {
        error!("❌ Grid parameters not saved");
        return Err(TradingError::ConfigValidation(validation.failure_summary()));
    }

    store.save_trading_parameters(&params)?;
    info!("💾 Saved [trading] section to {}", store.path().display());
    Ok(())
}

pub async fn preview_grid(store: &FileConfigStore, price: Option<&str>) -> TradingResult<()> {
    crate::require_config(store)?;

    let params = store
        .trading_parameters()?
        .ok_or_else(|| TradingError::ConfigMissing("[trading] section".to_string()))?;
    let engine = store.engine_settings()?;

    let reference = match price {
        Some(raw) => parse_positive_decimal("price", raw)?,
        None => {
            let client = LighterClient::new(
                &store.credentials()?,
                &store.network_settings()?,
                store.api_schema()?,
            )?;
            let price = client.get_current_price(&params.symbol).await?;
            info!("📡 Current {} price: {}", params.symbol, price);
            price
        }
    };

    let levels = generate(&params, reference, &engine.precision())?;
    let summary = summarize(&params, &levels);

    info!("📐 Grid Preview for {} at {}", params.symbol, reference);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for level in levels.iter().rev() {
        info!(
            "  #{:<3} {:<4} {:>14} x {}",
            level.index, level.side, level.price, level.quantity
        );
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("🟢 Buy orders:  {} ({} total)", summary.buy_orders, summary.total_buy_notional.round_dp(2));
    info!("🔴 Sell orders: {} ({} total)", summary.sell_orders, summary.total_sell_notional.round_dp(2));
    info!("⚙️  Leverage: {}x", summary.leverage);
    info!("💰 Margin required: {}", summary.margin_required.round_dp(2));

    for check in PreFlightValidator::check_parameters(&params, &engine) {
        if !check.passed && check.level == ValidationLevel::Warning {
            warn!("⚠️  {}: {}", check.name, check.message);
        }
    }
    Ok(())
}
