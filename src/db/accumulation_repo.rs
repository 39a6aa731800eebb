use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::AccumulationEntry;

/// Unique scope of one accumulation ledger row. YES and NO legs (and
/// distinct target traders) accumulate independently.
#[derive(Debug, Clone, Copy)]
pub struct AccumulationKey<'a> {
    pub follower_wallet: &'a str,
    pub target_trader_address: &'a str,
    pub market_id: &'a str,
    pub token_id: &'a str,
    pub outcome: &'a str,
}

/// Lock and read the ledger row for a key inside the caller's
/// transaction. The row lock serializes racing ticks on the same key;
/// the caller must upsert or delete before committing.
pub async fn lock_entry(
    tx: &mut Transaction<'_, Postgres>,
    key: AccumulationKey<'_>,
) -> anyhow::Result<Option<(Decimal, Decimal)>> {
    let row = sqlx::query_as::<_, AccumulationEntry>(
        r#"
        SELECT * FROM accumulation_entries
        WHERE follower_wallet = $1
          AND target_trader_address = $2
          AND market_id = $3
          AND token_id = $4
          AND outcome = $5
        FOR UPDATE
        "#,
    )
    .bind(key.follower_wallet)
    .bind(key.target_trader_address)
    .bind(key.market_id)
    .bind(key.token_id)
    .bind(key.outcome)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.map(|e| (e.accumulated_size, e.accumulated_value_usd)))
}

/// Persist the running sub-minimum total for a key.
pub async fn upsert_entry(
    tx: &mut Transaction<'_, Postgres>,
    key: AccumulationKey<'_>,
    accumulated_size: Decimal,
    accumulated_value_usd: Decimal,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO accumulation_entries
            (follower_wallet, target_trader_address, market_id, token_id, outcome,
             accumulated_size, accumulated_value_usd, last_updated)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        ON CONFLICT (follower_wallet, target_trader_address, market_id, token_id, outcome)
            DO UPDATE SET accumulated_size = $6, accumulated_value_usd = $7, last_updated = NOW()
        "#,
    )
    .bind(key.follower_wallet)
    .bind(key.target_trader_address)
    .bind(key.market_id)
    .bind(key.token_id)
    .bind(key.outcome)
    .bind(accumulated_size)
    .bind(accumulated_value_usd)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Clear a key's ledger row (its total is being folded into an order).
pub async fn delete_entry(
    tx: &mut Transaction<'_, Postgres>,
    key: AccumulationKey<'_>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        DELETE FROM accumulation_entries
        WHERE follower_wallet = $1
          AND target_trader_address = $2
          AND market_id = $3
          AND token_id = $4
          AND outcome = $5
        "#,
    )
    .bind(key.follower_wallet)
    .bind(key.target_trader_address)
    .bind(key.market_id)
    .bind(key.token_id)
    .bind(key.outcome)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// All live ledger rows for the external status surface.
pub async fn get_all_entries(pool: &PgPool) -> anyhow::Result<Vec<AccumulationEntry>> {
    let entries = sqlx::query_as::<_, AccumulationEntry>(
        "SELECT * FROM accumulation_entries ORDER BY last_updated DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(entries)
}
