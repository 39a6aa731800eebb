use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{OrderStatus, PendingCopyOrder, Side};

/// Parameters for a new copy order row.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub follower_wallet: &'a str,
    pub target_trader_address: &'a str,
    pub market_id: &'a str,
    pub token_id: &'a str,
    pub outcome: &'a str,
    pub side: Side,
    pub target_size: Decimal,
    pub target_price: Decimal,
    pub initial_price: Decimal,
}

/// Insert a freshly submitted order in the pending state.
pub async fn insert_pending(
    pool: &PgPool,
    order: NewOrder<'_>,
    venue_order_id: &str,
) -> anyhow::Result<PendingCopyOrder> {
    let row = sqlx::query_as::<_, PendingCopyOrder>(
        r#"
        INSERT INTO pending_copy_orders
            (follower_wallet, target_trader_address, market_id, token_id, outcome,
             order_side, target_size, target_price, initial_price, current_quoted_price,
             venue_order_id, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, $10, 'pending')
        RETURNING *
        "#,
    )
    .bind(order.follower_wallet)
    .bind(order.target_trader_address)
    .bind(order.market_id)
    .bind(order.token_id)
    .bind(order.outcome)
    .bind(order.side.to_string())
    .bind(order.target_size)
    .bind(order.target_price)
    .bind(order.initial_price)
    .bind(venue_order_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Record a venue rejection as a terminal failed row. Not retried.
pub async fn insert_failed(
    pool: &PgPool,
    order: NewOrder<'_>,
    error_message: &str,
) -> anyhow::Result<PendingCopyOrder> {
    let row = sqlx::query_as::<_, PendingCopyOrder>(
        r#"
        INSERT INTO pending_copy_orders
            (follower_wallet, target_trader_address, market_id, token_id, outcome,
             order_side, target_size, target_price, initial_price, current_quoted_price,
             status, error_message)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, 'failed', $10)
        RETURNING *
        "#,
    )
    .bind(order.follower_wallet)
    .bind(order.target_trader_address)
    .bind(order.market_id)
    .bind(order.token_id)
    .bind(order.outcome)
    .bind(order.side.to_string())
    .bind(order.target_size)
    .bind(order.target_price)
    .bind(order.initial_price)
    .bind(error_message)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// All orders still working (pending or partial), oldest first.
pub async fn get_open_orders(pool: &PgPool) -> anyhow::Result<Vec<PendingCopyOrder>> {
    let orders = sqlx::query_as::<_, PendingCopyOrder>(
        "SELECT * FROM pending_copy_orders WHERE status IN ('pending', 'partial') ORDER BY created_at ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(orders)
}

/// Open BUY orders for one (follower, market, token) — the stale intent
/// a closure or reversal must cancel.
pub async fn get_open_buy_orders_for_token(
    pool: &PgPool,
    follower_wallet: &str,
    market_id: &str,
    token_id: &str,
) -> anyhow::Result<Vec<PendingCopyOrder>> {
    let orders = sqlx::query_as::<_, PendingCopyOrder>(
        r#"
        SELECT * FROM pending_copy_orders
        WHERE follower_wallet = $1
          AND market_id = $2
          AND token_id = $3
          AND order_side = 'BUY'
          AND status IN ('pending', 'partial')
        "#,
    )
    .bind(follower_wallet)
    .bind(market_id)
    .bind(token_id)
    .fetch_all(pool)
    .await?;

    Ok(orders)
}

/// Every open order belonging to one (follower, target) pair, for the
/// transactional cancel that accompanies a config disable.
pub async fn get_open_orders_for_pair(
    pool: &PgPool,
    follower_wallet: &str,
    target_trader_address: &str,
) -> anyhow::Result<Vec<PendingCopyOrder>> {
    let orders = sqlx::query_as::<_, PendingCopyOrder>(
        r#"
        SELECT * FROM pending_copy_orders
        WHERE follower_wallet = $1
          AND target_trader_address = $2
          AND status IN ('pending', 'partial')
        "#,
    )
    .bind(follower_wallet)
    .bind(target_trader_address)
    .fetch_all(pool)
    .await?;

    Ok(orders)
}

/// Move an order to a new lifecycle state, enforcing the transition
/// table both in Rust and in the WHERE guard.
async fn transition(
    pool: &PgPool,
    order_id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
) -> anyhow::Result<()> {
    if !from.can_transition(to) {
        anyhow::bail!("illegal order transition {from} → {to} for {order_id}");
    }

    let result = sqlx::query(
        "UPDATE pending_copy_orders SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
    )
    .bind(order_id)
    .bind(from)
    .bind(to)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        anyhow::bail!("order {order_id} was not in state {from}; transition to {to} skipped");
    }

    Ok(())
}

/// Terminal fill: record the cumulative filled size and close the order.
pub async fn mark_filled(
    pool: &PgPool,
    order: &PendingCopyOrder,
    filled_size: Decimal,
) -> anyhow::Result<()> {
    transition(pool, order.id, order.status, OrderStatus::Filled).await?;

    sqlx::query("UPDATE pending_copy_orders SET filled_size = $2 WHERE id = $1")
        .bind(order.id)
        .bind(filled_size)
        .execute(pool)
        .await?;

    Ok(())
}

/// Partial fill: bump cumulative `filled_size` and swap in the fresh
/// venue order covering the remainder. The logical order row survives.
pub async fn mark_partial(
    pool: &PgPool,
    order: &PendingCopyOrder,
    filled_size: Decimal,
    new_venue_order_id: &str,
    new_price: Decimal,
) -> anyhow::Result<()> {
    if order.status == OrderStatus::Pending {
        transition(pool, order.id, OrderStatus::Pending, OrderStatus::Partial).await?;
    }

    sqlx::query(
        r#"
        UPDATE pending_copy_orders
        SET filled_size = $2,
            venue_order_id = $3,
            current_quoted_price = $4,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(order.id)
    .bind(filled_size)
    .bind(new_venue_order_id)
    .bind(new_price)
    .execute(pool)
    .await?;

    Ok(())
}

/// Close the order as cancelled, keeping whatever filled before the
/// cancellation landed.
pub async fn mark_cancelled(
    pool: &PgPool,
    order: &PendingCopyOrder,
    filled_size: Decimal,
) -> anyhow::Result<()> {
    transition(pool, order.id, order.status, OrderStatus::Cancelled).await?;

    if filled_size != order.filled_size {
        sqlx::query("UPDATE pending_copy_orders SET filled_size = $2 WHERE id = $1")
            .bind(order.id)
            .bind(filled_size)
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Cancel-replace re-quote: same logical order, new venue order and
/// price, one more adjustment on the clock.
pub async fn record_requote(
    pool: &PgPool,
    order_id: Uuid,
    new_venue_order_id: &str,
    new_price: Decimal,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE pending_copy_orders
        SET venue_order_id = $2,
            current_quoted_price = $3,
            adjustment_count = adjustment_count + 1,
            last_price_adjustment_at = $4,
            updated_at = NOW()
        WHERE id = $1 AND status IN ('pending', 'partial')
        "#,
    )
    .bind(order_id)
    .bind(new_venue_order_id)
    .bind(new_price)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Swap the venue order id after forced market conversion (price no
/// longer meaningful as a quote).
pub async fn record_market_conversion(
    pool: &PgPool,
    order_id: Uuid,
    new_venue_order_id: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE pending_copy_orders
        SET venue_order_id = $2, updated_at = NOW()
        WHERE id = $1 AND status IN ('pending', 'partial')
        "#,
    )
    .bind(order_id)
    .bind(new_venue_order_id)
    .execute(pool)
    .await?;

    Ok(())
}
