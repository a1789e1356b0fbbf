// Trade command implementations: run the grid and inspect the venue
use tracing::{info, warn};

use lighter_grid_bot::{
    ConfigStore, FileConfigStore, LighterClient, OrderLifecycleManager, TradingError,
    TradingResult,
};

pub async fn run_grid(store: &FileConfigStore) -> TradingResult<()> {
    crate::require_config(store)?;

    let mut manager = OrderLifecycleManager::new();
    manager.initialize(store).await?;

    let handle = manager.handle();
    let ctrl_c = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Ctrl-C received, cancelling grid...");
            ctrl_c.request_stop();
        }
    });

    info!("🚀 LIVE GRID");
    warn!("⚠️  Real money!");
    manager.run().await?;

    let status = handle.status();
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("🏁 Run {} finished", status.run_id);
    info!("🔄 Re-grids: {}", status.regrid_count);
    if let Some(open) = status.last_open_orders {
        info!("📋 Open orders at last check: {}", open);
    }
    Ok(())
}

pub async fn list_orders(store: &FileConfigStore) -> TradingResult<()> {
    let (client, symbol) = connect(store)?;
    let orders = client.list_open_orders(&symbol).await?;

    info!("📋 Open {} orders", symbol);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for order in &orders {
        info!(
            "  {:<20} {:<4} {:>14} x {}",
            order.order_id.as_deref().unwrap_or("?"),
            order.side.map(|s| s.as_str()).unwrap_or("?"),
            order.price.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string()),
            order.quantity.map(|q| q.to_string()).unwrap_or_else(|| "?".to_string()),
        );
    }
    if orders.is_empty() {
        info!("  No open orders");
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("Total: {} orders", orders.len());
    Ok(())
}

pub async fn cancel_all(store: &FileConfigStore) -> TradingResult<()> {
    let (client, symbol) = connect(store)?;
    client.cancel_all_orders(&symbol).await?;
    info!("🧹 Cancelled all {} orders", symbol);
    Ok(())
}

pub async fn cancel_order(store: &FileConfigStore, order_id: &str) -> TradingResult<()> {
    let (client, _) = connect(store)?;
    client.cancel_order(order_id).await?;
    info!("🗑️  Cancelled order {}", order_id);
    Ok(())
}

pub async fn show_balance(store: &FileConfigStore) -> TradingResult<()> {
    crate::require_config(store)?;
    let client = client(store)?;
    let balance = client.get_balance().await?;

    info!("💰 Account Balance");
    let pretty = serde_json::to_string_pretty(&balance)?;
    for line in pretty.lines() {
        info!("  {}", line);
    }
    Ok(())
}

fn client(store: &FileConfigStore) -> TradingResult<LighterClient> {
    let credentials = store.credentials()?;
    if !credentials.is_complete() {
        return Err(TradingError::ConfigMissing("api.api_key / api.api_secret".to_string()));
    }
    Ok(LighterClient::new(
        &credentials,
        &store.network_settings()?,
        store.api_schema()?,
    )?)
}

/// Signed client plus the configured symbol
fn connect(store: &FileConfigStore) -> TradingResult<(LighterClient, String)> {
    crate::require_config(store)?;
    let symbol = store
        .trading_parameters()?
        .map(|p| p.symbol)
        .ok_or_else(|| TradingError::ConfigMissing("[trading] section".to_string()))?;
    Ok((client(store)?, symbol))
}
