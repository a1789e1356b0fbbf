// Order lifecycle manager: keeps the venue's resting orders in line with the ladder
//
// One task owns the manager and drives `run()`. Front-ends talk to it only
// through a `ManagerHandle` (stop requests in, status snapshots out).

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clients::LighterClient;
use crate::config::{ConfigStore, EngineSettings};
use crate::core::price_ladder;
use crate::core::types::{PlacedOrder, RunState, StrategyParameters};
use crate::error::{TradingError, TradingResult};
use crate::validation::PreFlightValidator;

/// Point-in-time view of a manager, published on every change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub state: RunState,
    pub run_id: Uuid,
    pub symbol: Option<String>,
    pub placed_orders: usize,
    /// Levels in the last generated ladder; `None` until one was generated
    pub ladder_size: Option<usize>,
    pub last_open_orders: Option<usize>,
    pub reference_price: Option<Decimal>,
    pub regrid_count: u32,
}

/// Cloneable control surface for a manager owned by another task
#[derive(Clone)]
pub struct ManagerHandle {
    stop_tx: Arc<watch::Sender<bool>>,
    status_rx: watch::Receiver<StatusSnapshot>,
}

impl ManagerHandle {
    /// Ask the manager to wind down; it cancels resting orders and stops.
    pub fn request_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn stop_requested(&self) -> bool {
        *self.stop_tx.borrow()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status_rx.borrow().clone()
    }

    pub fn state(&self) -> RunState {
        self.status_rx.borrow().state
    }

    /// Resolve once the manager publishes `target`
    pub async fn wait_for_state(&self, target: RunState) -> TradingResult<()> {
        let mut rx = self.status_rx.clone();
        loop {
            if rx.borrow_and_update().state == target {
                return Ok(());
            }
            rx.changed()
                .await
                .map_err(|_| TradingError::Internal("order manager was dropped".to_string()))?;
        }
    }
}

impl std::fmt::Debug for ManagerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerHandle")
            .field("status", &*self.status_rx.borrow())
            .finish()
    }
}

/// Re-grid when the grid was never generated or too few orders still rest.
pub fn needs_regrid(open_orders: usize, ladder_size: Option<usize>, threshold: f64) -> bool {
    match ladder_size {
        None => true,
        Some(size) => (open_orders as f64) < size as f64 * threshold,
    }
}

pub struct OrderLifecycleManager {
    run_id: Uuid,
    state: RunState,
    params: Option<StrategyParameters>,
    engine: EngineSettings,
    client: Option<Arc<LighterClient>>,
    placed_orders: Vec<PlacedOrder>,
    ladder_size: Option<usize>,
    last_open_orders: Option<usize>,
    reference_price: Option<Decimal>,
    regrid_count: u32,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
    status_tx: watch::Sender<StatusSnapshot>,
}

impl OrderLifecycleManager {
    pub fn new() -> Self {
        let run_id = Uuid::new_v4();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (status_tx, _) = watch::channel(StatusSnapshot {
            state: RunState::Idle,
            run_id,
            symbol: None,
            placed_orders: 0,
            ladder_size: None,
            last_open_orders: None,
            reference_price: None,
            regrid_count: 0,
        });

        Self {
            run_id,
            state: RunState::Idle,
            params: None,
            engine: EngineSettings::default(),
            client: None,
            placed_orders: Vec::new(),
            ladder_size: None,
            last_open_orders: None,
            reference_price: None,
            regrid_count: 0,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
            status_tx,
        }
    }

    pub fn handle(&self) -> ManagerHandle {
        ManagerHandle {
            stop_tx: Arc::clone(&self.stop_tx),
            status_rx: self.status_tx.subscribe(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn parameters(&self) -> Option<&StrategyParameters> {
        self.params.as_ref()
    }

    pub fn placed_orders(&self) -> &[PlacedOrder] {
        &self.placed_orders
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state,
            run_id: self.run_id,
            symbol: self.params.as_ref().map(|p| p.symbol.clone()),
            placed_orders: self.placed_orders.len(),
            ladder_size: self.ladder_size,
            last_open_orders: self.last_open_orders,
            reference_price: self.reference_price,
            regrid_count: self.regrid_count,
        }
    }

    /// Load configuration and build the venue client.
    ///
    /// Nothing touches the network here. A configuration failure leaves the
    /// manager `Stopped`.
    pub async fn initialize(&mut self, store: &dyn ConfigStore) -> TradingResult<()> {
        if self.state == RunState::Stopped {
            // Re-initialization starts a fresh run
            self.stop_tx.send_replace(false);
            self.run_id = Uuid::new_v4();
        }
        self.transition(RunState::Initializing)?;

        self.placed_orders.clear();
        self.ladder_size = None;
        self.last_open_orders = None;
        self.reference_price = None;
        self.regrid_count = 0;

        match self.load(store) {
            Ok(()) => {
                if let Some(params) = &self.params {
                    info!(
                        run_id = %self.run_id,
                        "⚙️  Initialized {} grid: {}..{} in {} grids, {} per order, {}x",
                        params.symbol,
                        params.lower_price,
                        params.upper_price,
                        params.grid_count,
                        params.order_notional,
                        params.leverage
                    );
                }
                self.publish();
                Ok(())
            }
            Err(e) => {
                error!(run_id = %self.run_id, "❌ Configuration error: {}", e);
                self.client = None;
                self.transition(RunState::Stopped)?;
                Err(e)
            }
        }
    }

    fn load(&mut self, store: &dyn ConfigStore) -> TradingResult<()> {
        let credentials = store.credentials()?;
        let params = store.trading_parameters()?;
        let network = store.network_settings()?;
        let engine = store.engine_settings()?;
        let schema = store.api_schema()?;

        if !credentials.is_complete() {
            return Err(TradingError::ConfigMissing("api.api_key / api.api_secret".to_string()));
        }
        let params = params.ok_or_else(|| TradingError::ConfigMissing("[trading] section".to_string()))?;

        let validation = PreFlightValidator::validate(&credentials, Some(&params), &network, &engine);
        for warning in validation.warnings() {
            warn!("⚠️  {}: {}", warning.name, warning.message);
        }
        if !validation.passed {
            return Err(TradingError::ConfigValidation(validation.failure_summary()));
        }

        let client = LighterClient::new(&credentials, &network, schema)?;
        debug!("Venue client ready for {}", client.base_url());

        self.client = Some(Arc::new(client));
        self.params = Some(params);
        self.engine = engine;
        Ok(())
    }

    /// Replace whatever rests on the venue with a fresh ladder at the current price.
    ///
    /// Returns the number of levels the venue acknowledged. Individual level
    /// failures are logged and skipped; the manager ends in `Monitoring`.
    pub async fn place_grid_orders(&mut self) -> TradingResult<usize> {
        let (client, params) = self.ready()?;
        self.transition(RunState::Placing)?;

        let result = self.place_ladder(&client, &params).await;

        self.transition(RunState::Monitoring)?;
        result
    }

    async fn place_ladder(
        &mut self,
        client: &LighterClient,
        params: &StrategyParameters,
    ) -> TradingResult<usize> {
        let reference = match client.get_current_price(&params.symbol).await {
            Ok(price) => price,
            Err(e) => {
                error!("❌ Could not fetch {} price, grid not placed: {}", params.symbol, e);
                return Err(e.into());
            }
        };
        let levels = price_ladder::generate(params, reference, &self.engine.precision())?;
        info!(
            "📐 {} ladder at {}: {} levels",
            params.symbol,
            reference,
            levels.len()
        );

        let previous = std::mem::take(&mut self.placed_orders);
        match client.cancel_all_orders(&params.symbol).await {
            Ok(_) => debug!("Cleared resting {} orders", params.symbol),
            Err(e) => {
                warn!("⚠️  Could not cancel existing {} orders: {}", params.symbol, e);
                if !previous.is_empty() {
                    let ids: Vec<&str> = previous.iter().map(|o| o.order_id.as_str()).collect();
                    warn!("⚠️  Dropping {} order(s) from the previous ladder: {}", ids.len(), ids.join(", "));
                }
            }
        }

        self.reference_price = Some(reference);
        self.ladder_size = Some(levels.len());
        self.publish();

        let mut placed = 0;
        let mut soft_failures = 0;
        for (i, level) in levels.iter().enumerate() {
            let mut pause = self.engine.placement_delay();

            match client
                .place_order(&params.symbol, level.side, level.price, level.quantity, params.leverage)
                .await
            {
                Ok(Some(order_id)) => {
                    debug!(
                        "✅ {} {} @ {} -> {}",
                        level.side, level.quantity, level.price, order_id
                    );
                    self.placed_orders.push(PlacedOrder {
                        order_id,
                        level: level.clone(),
                    });
                    placed += 1;
                    self.publish();
                }
                Ok(None) => {
                    soft_failures += 1;
                    warn!(
                        "⚠️  No order id returned for {} {} @ {}",
                        level.side, level.quantity, level.price
                    );
                }
                Err(e) if e.is_network() => {
                    warn!(
                        "🌐 Network failure placing {} @ {}, cooling down: {}",
                        level.side, level.price, e
                    );
                    pause = self.engine.network_cooldown();
                }
                Err(e) => {
                    error!("❌ Failed to place {} @ {}: {}", level.side, level.price, e);
                }
            }

            if self.stop_requested() {
                info!("🛑 Stop requested, halting placement");
                break;
            }
            if i + 1 < levels.len() && self.pause_or_stop(pause).await {
                info!("🛑 Stop requested, halting placement");
                break;
            }
        }

        if soft_failures > 0 {
            warn!("⚠️  {} level(s) acknowledged without an order id", soft_failures);
        }
        info!("📊 Placed {}/{} grid orders for {}", placed, levels.len(), params.symbol);
        Ok(placed)
    }

    /// Compare the venue's open orders with the ladder and re-grid if needed.
    ///
    /// Returns whether a re-grid happened.
    pub async fn monitor_orders(&mut self) -> TradingResult<bool> {
        let (client, params) = self.ready()?;
        if self.state != RunState::Monitoring {
            return Err(TradingError::InvalidStateTransition(self.state, RunState::Monitoring));
        }

        let open = match client.list_open_orders(&params.symbol).await {
            Ok(orders) => orders.len(),
            Err(e) if e.is_network() => {
                warn!("🌐 Could not list open orders, will retry next tick: {}", e);
                return Err(e.into());
            }
            Err(e) => {
                error!("❌ Could not list open orders: {}", e);
                return Err(e.into());
            }
        };
        self.last_open_orders = Some(open);
        self.publish();

        if !needs_regrid(open, self.ladder_size, self.engine.regrid_threshold) {
            debug!(
                "🔍 {} open orders of {} placed levels",
                open,
                self.ladder_size.unwrap_or(0)
            );
            return Ok(false);
        }

        match self.ladder_size {
            Some(size) => info!("🔄 Only {}/{} orders open, re-gridding", open, size),
            None => info!("🔄 No ladder on the venue yet, placing grid"),
        }
        self.regrid_count += 1;
        self.place_grid_orders().await?;
        Ok(true)
    }

    /// Place the grid and monitor it until a stop is requested, then stop.
    pub async fn run(&mut self) -> TradingResult<()> {
        if self.state != RunState::Initializing {
            return Err(TradingError::NotInitialized);
        }
        let interval = self.engine.monitor_interval();
        info!(run_id = %self.run_id, "🚀 Starting grid run, monitoring every {:?}", interval);

        if !self.stop_requested() {
            if let Err(e) = self.place_grid_orders().await {
                warn!("Initial placement incomplete ({}), next tick will retry", e.category());
            }
        }

        while !self.stop_requested() {
            if self.pause_or_stop(interval).await {
                break;
            }
            if let Err(e) = self.monitor_orders().await {
                debug!("Monitor cycle failed: {}", e);
            }
        }

        self.stop().await
    }

    /// Cancel everything for the symbol once and move to `Stopped`.
    ///
    /// The state ends `Stopped` even when the cancel fails.
    pub async fn stop(&mut self) -> TradingResult<()> {
        if matches!(self.state, RunState::Idle | RunState::Stopped) {
            return Ok(());
        }
        self.stop_tx.send_replace(true);
        self.transition(RunState::Stopping)?;

        if let (Some(client), Some(params)) = (self.client.clone(), self.params.clone()) {
            match client.cancel_all_orders(&params.symbol).await {
                Ok(_) => {
                    info!("🧹 Cancelled all {} orders", params.symbol);
                    self.placed_orders.clear();
                }
                Err(e) => {
                    warn!("⚠️  Cancel-all failed, orders may still rest on the venue: {}", e);
                }
            }
        }

        self.transition(RunState::Stopped)?;
        info!(run_id = %self.run_id, "⏹️  Grid run stopped");
        Ok(())
    }

    fn ready(&self) -> TradingResult<(Arc<LighterClient>, StrategyParameters)> {
        match (&self.client, &self.params) {
            (Some(client), Some(params)) => Ok((Arc::clone(client), params.clone())),
            _ => Err(TradingError::NotInitialized),
        }
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Sleep for `duration`; true if a stop was requested first
    async fn pause_or_stop(&self, duration: Duration) -> bool {
        let mut stop_rx = self.stop_rx.clone();
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.stop_requested(),
            _ = stop_signalled(&mut stop_rx) => true,
        }
    }

    fn transition(&mut self, next: RunState) -> TradingResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(TradingError::InvalidStateTransition(self.state, next));
        }
        debug!(run_id = %self.run_id, "State {} -> {}", self.state, next);
        self.state = next;
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status());
    }
}

impl Default for OrderLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn stop_signalled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone: no stop can arrive any more
            std::future::pending::<()>().await;
        }
    }
}
