use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::gateway::VenuePosition;
use crate::models::PositionSnapshot;

/// Load the most recent snapshot for a trader as a token-keyed map,
/// dropping zero-size closure markers (they exist so the diff sees an
/// explicit empty state, not so they count as holdings).
pub async fn latest_snapshot(
    pool: &PgPool,
    target_trader_address: &str,
) -> anyhow::Result<HashMap<String, VenuePosition>> {
    let rows = sqlx::query_as::<_, PositionSnapshot>(
        r#"
        SELECT * FROM position_snapshots
        WHERE target_trader_address = $1
          AND captured_at = (
              SELECT MAX(captured_at)
              FROM position_snapshots
              WHERE target_trader_address = $1
          )
        "#,
    )
    .bind(target_trader_address)
    .fetch_all(pool)
    .await?;

    let map = rows
        .into_iter()
        .filter(|r| r.size > Decimal::ZERO)
        .map(|r| {
            (
                r.token_id.clone(),
                VenuePosition {
                    market_id: r.market_id,
                    token_id: r.token_id,
                    outcome: r.outcome,
                    size: r.size,
                    avg_price: r.avg_entry_price,
                },
            )
        })
        .collect();

    Ok(map)
}

/// Append one tick's worth of snapshot rows for a trader. All rows of
/// a tick share a single `captured_at` so `latest_snapshot` picks up
/// the whole set atomically.
pub async fn insert_snapshot(
    pool: &PgPool,
    target_trader_address: &str,
    positions: &[VenuePosition],
) -> anyhow::Result<()> {
    let captured_at = chrono::Utc::now();
    let mut tx = pool.begin().await?;

    for pos in positions {
        sqlx::query(
            r#"
            INSERT INTO position_snapshots
                (target_trader_address, market_id, token_id, outcome, size, avg_entry_price, captured_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(target_trader_address)
        .bind(&pos.market_id)
        .bind(&pos.token_id)
        .bind(&pos.outcome)
        .bind(pos.size)
        .bind(pos.avg_price)
        .bind(captured_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
