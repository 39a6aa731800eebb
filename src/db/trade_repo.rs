use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::models::trade::TargetPnl;
use crate::models::{ExecutedCopyTrade, PendingCopyOrder};

/// Record a terminal executed copy trade; written exactly once per
/// order that reaches the filled state.
pub async fn insert_executed(
    pool: &PgPool,
    order: &PendingCopyOrder,
    size: Decimal,
    fill_price: Decimal,
    realized_pnl: Decimal,
) -> anyhow::Result<ExecutedCopyTrade> {
    let slippage = fill_price - order.target_price;

    let trade = sqlx::query_as::<_, ExecutedCopyTrade>(
        r#"
        INSERT INTO executed_copy_trades
            (follower_wallet, target_trader_address, market_id, token_id, outcome,
             order_side, size, fill_price, target_price, slippage, realized_pnl, venue_order_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(&order.follower_wallet)
    .bind(&order.target_trader_address)
    .bind(&order.market_id)
    .bind(&order.token_id)
    .bind(&order.outcome)
    .bind(&order.order_side)
    .bind(size)
    .bind(fill_price)
    .bind(order.target_price)
    .bind(slippage)
    .bind(realized_pnl)
    .bind(order.venue_order_id.as_deref())
    .fetch_one(pool)
    .await?;

    Ok(trade)
}

/// Recent executions for the external status surface.
pub async fn get_recent_trades(
    pool: &PgPool,
    follower_wallet: &str,
    limit: i64,
) -> anyhow::Result<Vec<ExecutedCopyTrade>> {
    let trades = sqlx::query_as::<_, ExecutedCopyTrade>(
        r#"
        SELECT * FROM executed_copy_trades
        WHERE follower_wallet = $1
        ORDER BY executed_at DESC
        LIMIT $2
        "#,
    )
    .bind(follower_wallet)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(trades)
}

/// Aggregate realized PnL and slippage per target trader.
pub async fn pnl_by_target(pool: &PgPool, follower_wallet: &str) -> anyhow::Result<Vec<TargetPnl>> {
    let rows = sqlx::query_as::<_, TargetPnl>(
        r#"
        SELECT target_trader_address,
               COUNT(*) AS trade_count,
               COALESCE(SUM(realized_pnl), 0) AS total_realized_pnl,
               COALESCE(AVG(slippage), 0) AS avg_slippage
        FROM executed_copy_trades
        WHERE follower_wallet = $1
        GROUP BY target_trader_address
        ORDER BY total_realized_pnl DESC
        "#,
    )
    .bind(follower_wallet)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
