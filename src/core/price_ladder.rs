// Grid ladder generation: strategy parameters + reference price -> resting levels

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::core::types::{GridLevel, LadderPrecision, Side, StrategyParameters};
use crate::error::{TradingError, TradingResult};

/// Largest scale a `Decimal` can carry
pub const MAX_DECIMALS: u32 = 28;

/// Floor a positive decimal to `decimals` places
pub fn floor_to(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
}

/// Check parameters against the invariants the ladder relies on
pub fn validate(params: &StrategyParameters, precision: &LadderPrecision) -> TradingResult<()> {
    let invalid = |name: &str, reason: String| Err(TradingError::InvalidParameter(name.to_string(), reason));

    if params.symbol.trim().is_empty() {
        return invalid("symbol", "must not be empty".to_string());
    }
    if params.lower_price <= Decimal::ZERO {
        return invalid("lower_price", format!("must be positive, got {}", params.lower_price));
    }
    if params.upper_price <= params.lower_price {
        return invalid(
            "upper_price",
            format!("must be above lower_price ({} <= {})", params.upper_price, params.lower_price),
        );
    }
    if params.grid_count < 2 {
        return invalid("grid_count", format!("must be at least 2, got {}", params.grid_count));
    }
    if params.leverage < 1 {
        return invalid("leverage", "must be at least 1".to_string());
    }
    if params.order_notional <= Decimal::ZERO {
        return invalid("order_notional", format!("must be positive, got {}", params.order_notional));
    }

    for (name, decimals) in [
        ("price_decimals", precision.price_decimals),
        ("quantity_decimals", precision.quantity_decimals),
    ] {
        if decimals > MAX_DECIMALS {
            return invalid(name, format!("must be at most {}, got {}", MAX_DECIMALS, decimals));
        }
    }

    // Bounds sit on the tick and the step spans at least one tick
    for (name, bound) in [("lower_price", params.lower_price), ("upper_price", params.upper_price)] {
        if floor_to(bound, precision.price_decimals) != bound {
            return invalid(
                name,
                format!(
                    "{} has more than {} decimal places; raise engine.price_decimals to match the venue tick",
                    bound, precision.price_decimals
                ),
            );
        }
    }

    let tick = Decimal::new(1, precision.price_decimals);
    if params.step() < tick {
        return invalid(
            "grid_count",
            format!(
                "{} grids over {}..{} is finer than the {} price tick; use fewer grids or raise engine.price_decimals",
                params.grid_count, params.lower_price, params.upper_price, tick
            ),
        );
    }

    Ok(())
}

/// Candidate price of grid line `index`, before side assignment
fn grid_price(params: &StrategyParameters, index: u32, precision: &LadderPrecision) -> Decimal {
    // Multiply before dividing so the last line lands exactly on upper_price
    let offset = (params.upper_price - params.lower_price) * Decimal::from(index)
        / Decimal::from(params.grid_count);
    floor_to(params.lower_price + offset, precision.price_decimals)
}

/// All `grid_count + 1` candidate prices, lowest first
pub fn grid_prices(params: &StrategyParameters, precision: &LadderPrecision) -> Vec<Decimal> {
    (0..=params.grid_count)
        .map(|i| grid_price(params, i, precision))
        .collect()
}

/// Build the ladder for `reference_price`.
///
/// Levels below the reference buy, levels above sell, and a level that lands
/// exactly on the reference is left out. Levels whose floored quantity is zero
/// are dropped. The output is ordered by grid index and fully determined by
/// the inputs.
pub fn generate(
    params: &StrategyParameters,
    reference_price: Decimal,
    precision: &LadderPrecision,
) -> TradingResult<Vec<GridLevel>> {
    validate(params, precision)?;
    if reference_price <= Decimal::ZERO {
        return Err(TradingError::InvalidParameter(
            "reference_price".to_string(),
            format!("must be positive, got {}", reference_price),
        ));
    }

    let levels = grid_prices(params, precision)
        .into_iter()
        .zip(0u32..)
        .filter_map(|(price, index)| {
            let side = match price.cmp(&reference_price) {
                std::cmp::Ordering::Less => Side::Buy,
                std::cmp::Ordering::Greater => Side::Sell,
                std::cmp::Ordering::Equal => return None,
            };

            let quantity = floor_to(params.order_notional / price, precision.quantity_decimals);
            if quantity <= Decimal::ZERO {
                return None;
            }

            Some(GridLevel {
                price,
                quantity,
                side,
                index,
            })
        })
        .collect();

    Ok(levels)
}

/// Totals shown before a run starts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LadderSummary {
    pub symbol: String,
    pub lower_price: Decimal,
    pub upper_price: Decimal,
    pub grid_count: u32,
    pub leverage: u32,
    pub order_notional: Decimal,
    pub buy_orders: usize,
    pub sell_orders: usize,
    pub total_buy_notional: Decimal,
    pub total_sell_notional: Decimal,
    /// Margin needed for the buy side: total buy notional / leverage
    pub margin_required: Decimal,
}

pub fn summarize(params: &StrategyParameters, levels: &[GridLevel]) -> LadderSummary {
    let notional = |side: Side| -> Decimal {
        levels
            .iter()
            .filter(|level| level.side == side)
            .map(|level| level.price * level.quantity)
            .sum()
    };
    let total_buy_notional = notional(Side::Buy);
    let total_sell_notional = notional(Side::Sell);

    LadderSummary {
        symbol: params.symbol.clone(),
        lower_price: params.lower_price,
        upper_price: params.upper_price,
        grid_count: params.grid_count,
        leverage: params.leverage,
        order_notional: params.order_notional,
        buy_orders: levels.iter().filter(|l| l.side == Side::Buy).count(),
        sell_orders: levels.iter().filter(|l| l.side == Side::Sell).count(),
        total_buy_notional,
        total_sell_notional,
        margin_required: total_buy_notional / Decimal::from(params.leverage.max(1)),
    }
}
