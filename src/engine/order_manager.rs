use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::db::order_repo::{self, NewOrder};
use crate::db::trade_repo;
use crate::gateway::{GatewayError, VenueGateway, VenueOrderState};
use crate::models::{PendingCopyOrder, Side};

use super::copy_engine::EngineConfig;
use super::pricing::{self, PriceDecision};

/// A re-quote is only worth a cancel-replace when the price actually
/// moved; below this the old quote stands.
const REQUOTE_EPSILON: &str = "0.001";

/// Submit a limit order at the target trader's observed price and
/// record it. Venue rejections become terminal failed rows and are not
/// retried; transient errors bubble up so the next tick retries the
/// whole copy event with no state written.
pub async fn open_order(
    pool: &PgPool,
    gateway: &dyn VenueGateway,
    config: &EngineConfig,
    new: NewOrder<'_>,
) -> anyhow::Result<Option<PendingCopyOrder>> {
    if config.dry_run {
        tracing::info!(
            market = %new.market_id,
            side = %new.side,
            size = %new.target_size,
            price = %new.initial_price,
            "[DRY-RUN] Would place copy order"
        );
        return Ok(None);
    }

    match gateway
        .place_limit_order(new.token_id, new.side, new.target_size, new.initial_price)
        .await
    {
        Ok(venue_order_id) => {
            let order = order_repo::insert_pending(pool, new, &venue_order_id).await?;
            counter!("orders_placed").increment(1);
            tracing::info!(
                order_id = %order.id,
                venue_order_id,
                market = %order.market_id,
                side = %order.order_side,
                size = %order.target_size,
                price = %order.current_quoted_price,
                "Copy order placed"
            );
            Ok(Some(order))
        }
        Err(e) if !e.is_transient() => {
            let reason = e.to_string();
            let order = order_repo::insert_failed(pool, new, &reason).await?;
            counter!("orders_failed").increment(1);
            tracing::warn!(
                order_id = %order.id,
                market = %order.market_id,
                reason,
                "Copy order rejected by venue"
            );
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Advance every working order one step through its lifecycle. One
/// order's failure never blocks the rest.
pub async fn manage_pending_orders(
    pool: &PgPool,
    gateway: &dyn VenueGateway,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let orders = order_repo::get_open_orders(pool).await?;
    metrics::gauge!("open_copy_orders").set(orders.len() as f64);

    if orders.is_empty() {
        tracing::debug!("No open copy orders to manage");
        return Ok(());
    }

    tracing::debug!(count = orders.len(), "Managing open copy orders");

    for order in &orders {
        if let Err(e) = manage_single_order(pool, gateway, config, order, now).await {
            tracing::error!(
                error = %e,
                order_id = %order.id,
                market = %order.market_id,
                "Failed to manage order"
            );
        }
    }

    Ok(())
}

async fn manage_single_order(
    pool: &PgPool,
    gateway: &dyn VenueGateway,
    config: &EngineConfig,
    order: &PendingCopyOrder,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let Some(venue_order_id) = order.venue_order_id.as_deref().filter(|id| !id.is_empty())
    else {
        tracing::warn!(order_id = %order.id, "Open order has no venue order id — cancelling");
        order_repo::mark_cancelled(pool, order, order.filled_size).await?;
        counter!("orders_cancelled").increment(1);
        return Ok(());
    };

    let status = match gateway.get_order_status(venue_order_id).await {
        Ok(s) => s,
        Err(e) if e.is_transient() => {
            tracing::warn!(
                order_id = %order.id,
                venue_order_id,
                error = %e,
                "Venue status lookup failed — retrying next tick"
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    // Fills on the venue order currently working, on top of whatever
    // earlier venue orders for this row already filled.
    let cumulative_filled = order.filled_size + status.filled_size;

    match status.state {
        VenueOrderState::Filled => {
            settle_fill(pool, order, cumulative_filled, status.avg_fill_price).await
        }
        VenueOrderState::Cancelled => {
            tracing::info!(
                order_id = %order.id,
                venue_order_id,
                filled = %cumulative_filled,
                "Venue cancelled the working order"
            );
            // Fills that landed before the cancellation are real; record
            // them so the follower's held size is not understated.
            if status.filled_size > Decimal::ZERO {
                let fill_price = status.avg_fill_price.unwrap_or(order.current_quoted_price);
                let pnl = realized_pnl(order, fill_price, status.filled_size);
                trade_repo::insert_executed(pool, order, status.filled_size, fill_price, pnl)
                    .await?;
            }
            order_repo::mark_cancelled(pool, order, cumulative_filled).await?;
            counter!("orders_cancelled").increment(1);
            Ok(())
        }
        VenueOrderState::Open => {
            let hours_elapsed = pricing::hours_between(order.created_at.unwrap_or(now), now);

            if cumulative_filled >= order.target_size {
                return settle_fill(pool, order, cumulative_filled, status.avg_fill_price).await;
            }

            if hours_elapsed >= config.pricing.windows.market_h {
                return convert_to_market(
                    pool,
                    gateway,
                    order,
                    venue_order_id,
                    cumulative_filled,
                    hours_elapsed,
                )
                .await;
            }

            if status.filled_size > Decimal::ZERO {
                return continue_partial(
                    pool,
                    gateway,
                    config,
                    order,
                    venue_order_id,
                    cumulative_filled,
                    hours_elapsed,
                )
                .await;
            }

            maybe_requote(pool, gateway, config, order, venue_order_id, now, hours_elapsed).await
        }
    }
}

/// Opening buys realize nothing; sells realize against the entry the
/// copied position was carried at (its target price).
fn realized_pnl(order: &PendingCopyOrder, fill_price: Decimal, size: Decimal) -> Decimal {
    match Side::from_api_str(&order.order_side) {
        Some(Side::Sell) => (fill_price - order.target_price) * size,
        _ => Decimal::ZERO,
    }
}

/// Terminal fill: close the order and write the executed-trade row.
async fn settle_fill(
    pool: &PgPool,
    order: &PendingCopyOrder,
    filled_size: Decimal,
    avg_fill_price: Option<Decimal>,
) -> anyhow::Result<()> {
    let fill_price = avg_fill_price.unwrap_or(order.current_quoted_price);
    let realized_pnl = realized_pnl(order, fill_price, filled_size);

    order_repo::mark_filled(pool, order, filled_size).await?;
    trade_repo::insert_executed(pool, order, filled_size, fill_price, realized_pnl).await?;
    counter!("orders_filled").increment(1);

    tracing::info!(
        order_id = %order.id,
        market = %order.market_id,
        side = %order.order_side,
        filled_size = %filled_size,
        fill_price = %fill_price,
        target_price = %order.target_price,
        realized_pnl = %realized_pnl,
        "Copy order filled"
    );

    Ok(())
}

/// 36h+ unfilled: cancel whatever is working and take the market price
/// for the remainder. Guaranteed execution beats further patience.
async fn convert_to_market(
    pool: &PgPool,
    gateway: &dyn VenueGateway,
    order: &PendingCopyOrder,
    venue_order_id: &str,
    cumulative_filled: Decimal,
    hours_elapsed: f64,
) -> anyhow::Result<()> {
    let remaining = (order.target_size - cumulative_filled).max(Decimal::ZERO);
    let side = Side::from_api_str(&order.order_side)
        .ok_or_else(|| anyhow::anyhow!("unknown order side {}", order.order_side))?;

    tracing::info!(
        order_id = %order.id,
        market = %order.market_id,
        hours_elapsed = format!("{hours_elapsed:.1}"),
        remaining = %remaining,
        "Converting unfilled order to market order"
    );

    gateway.cancel_order(venue_order_id).await?;
    let new_venue_id = gateway
        .place_market_order(&order.token_id, side, remaining)
        .await?;

    if cumulative_filled > order.filled_size {
        order_repo::mark_partial(pool, order, cumulative_filled, &new_venue_id, order.current_quoted_price).await?;
    } else {
        order_repo::record_market_conversion(pool, order.id, &new_venue_id).await?;
    }

    counter!("orders_market_converted").increment(1);
    Ok(())
}

/// Partial fill: the filled portion stays filled; only the remainder
/// goes back out, re-priced to the current escalation stage. The
/// logical order row keeps its identity and cumulative filled size.
async fn continue_partial(
    pool: &PgPool,
    gateway: &dyn VenueGateway,
    config: &EngineConfig,
    order: &PendingCopyOrder,
    venue_order_id: &str,
    cumulative_filled: Decimal,
    hours_elapsed: f64,
) -> anyhow::Result<()> {
    let remaining = order.target_size - cumulative_filled;
    let side = Side::from_api_str(&order.order_side)
        .ok_or_else(|| anyhow::anyhow!("unknown order side {}", order.order_side))?;

    let quote = gateway.get_market_quote(&order.token_id).await?;
    let price = match pricing::price_for(
        order.target_price,
        side,
        quote,
        hours_elapsed,
        &config.pricing,
    ) {
        PriceDecision::Limit { price, .. } => price,
        // hours >= market_h was handled before this point
        PriceDecision::Market => order.current_quoted_price,
    };

    tracing::info!(
        order_id = %order.id,
        market = %order.market_id,
        filled = %cumulative_filled,
        remaining = %remaining,
        price = %price,
        "Partial fill — re-quoting remainder"
    );

    gateway.cancel_order(venue_order_id).await?;
    let new_venue_id = gateway
        .place_limit_order(&order.token_id, side, remaining, price)
        .await?;

    order_repo::mark_partial(pool, order, cumulative_filled, &new_venue_id, price).await?;
    counter!("orders_partial_fills").increment(1);

    Ok(())
}

/// Unfilled and inside the escalation schedule: consult pricing, and
/// cancel-replace when the fresh quote differs materially.
async fn maybe_requote(
    pool: &PgPool,
    gateway: &dyn VenueGateway,
    config: &EngineConfig,
    order: &PendingCopyOrder,
    venue_order_id: &str,
    now: DateTime<Utc>,
    hours_elapsed: f64,
) -> anyhow::Result<()> {
    let due = pricing::should_adjust(
        order.created_at.unwrap_or(now),
        order.last_price_adjustment_at,
        order.adjustment_count,
        now,
        &config.pricing.windows,
    );
    if !due {
        return Ok(());
    }

    let side = Side::from_api_str(&order.order_side)
        .ok_or_else(|| anyhow::anyhow!("unknown order side {}", order.order_side))?;
    let quote = gateway.get_market_quote(&order.token_id).await?;

    let new_price = match pricing::price_for(
        order.target_price,
        side,
        quote,
        hours_elapsed,
        &config.pricing,
    ) {
        PriceDecision::Limit { price, urgency } => {
            tracing::debug!(
                order_id = %order.id,
                price = %price,
                urgency = %urgency,
                hours_elapsed = format!("{hours_elapsed:.1}"),
                "Escalation price computed"
            );
            price
        }
        PriceDecision::Market => return Ok(()), // handled by the 36h branch
    };

    let epsilon: Decimal = REQUOTE_EPSILON.parse().unwrap_or(Decimal::ZERO);
    if (new_price - order.current_quoted_price).abs() <= epsilon {
        return Ok(());
    }

    tracing::info!(
        order_id = %order.id,
        market = %order.market_id,
        old_price = %order.current_quoted_price,
        new_price = %new_price,
        adjustment = order.adjustment_count + 1,
        "Adjusting order price"
    );

    gateway.cancel_order(venue_order_id).await?;
    let new_venue_id = gateway
        .place_limit_order(&order.token_id, side, order.remaining_size(), new_price)
        .await?;

    order_repo::record_requote(pool, order.id, &new_venue_id, new_price).await?;
    counter!("orders_requoted").increment(1);

    Ok(())
}

/// Cancel every open BUY for one (follower, market, token). Called the
/// instant a closure or reversal is observed: stale intent never stays
/// live.
pub async fn cancel_stale_buys(
    pool: &PgPool,
    gateway: &dyn VenueGateway,
    follower_wallet: &str,
    market_id: &str,
    token_id: &str,
) -> anyhow::Result<()> {
    let stale =
        order_repo::get_open_buy_orders_for_token(pool, follower_wallet, market_id, token_id)
            .await?;

    for order in &stale {
        if let Err(e) = cancel_order_row(pool, gateway, order).await {
            tracing::error!(error = %e, order_id = %order.id, "Failed to cancel stale buy order");
            continue;
        }
        tracing::info!(
            order_id = %order.id,
            market = %order.market_id,
            "Cancelled stale BUY order (target trader reversed)"
        );
    }

    Ok(())
}

/// Cancel every open order for a (follower, target) pair — the other
/// half of disabling a copy config.
pub async fn cancel_open_orders_for_pair(
    pool: &PgPool,
    gateway: &dyn VenueGateway,
    follower_wallet: &str,
    target_trader_address: &str,
) -> anyhow::Result<usize> {
    let open =
        order_repo::get_open_orders_for_pair(pool, follower_wallet, target_trader_address).await?;
    let mut cancelled = 0;

    for order in &open {
        match cancel_order_row(pool, gateway, order).await {
            Ok(()) => cancelled += 1,
            Err(e) => {
                tracing::error!(error = %e, order_id = %order.id, "Failed to cancel order on disable");
            }
        }
    }

    Ok(cancelled)
}

async fn cancel_order_row(
    pool: &PgPool,
    gateway: &dyn VenueGateway,
    order: &PendingCopyOrder,
) -> anyhow::Result<()> {
    if let Some(venue_id) = order.venue_order_id.as_deref().filter(|id| !id.is_empty()) {
        match gateway.cancel_order(venue_id).await {
            Ok(()) => {}
            // Already gone on the venue side is fine; anything else is not
            Err(GatewayError::Rejected(reason)) => {
                tracing::debug!(order_id = %order.id, reason, "Venue cancel rejected");
            }
            Err(e) => return Err(e.into()),
        }
    }

    order_repo::mark_cancelled(pool, order, order.filled_size).await?;
    counter!("orders_cancelled").increment(1);
    Ok(())
}
