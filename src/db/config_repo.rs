use sqlx::PgPool;
use uuid::Uuid;

use crate::models::CopyConfig;

/// Get all enabled copy configs.
pub async fn get_enabled_configs(pool: &PgPool) -> anyhow::Result<Vec<CopyConfig>> {
    let configs = sqlx::query_as::<_, CopyConfig>(
        "SELECT * FROM copy_configs WHERE enabled = true ORDER BY created_at ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(configs)
}

pub async fn get_config(pool: &PgPool, config_id: Uuid) -> anyhow::Result<Option<CopyConfig>> {
    let config = sqlx::query_as::<_, CopyConfig>("SELECT * FROM copy_configs WHERE id = $1")
        .bind(config_id)
        .fetch_optional(pool)
        .await?;

    Ok(config)
}

/// Flip a config's enabled flag. Cancelling the pair's open orders on
/// disable is handled by the order manager in the same unit of work.
pub async fn set_enabled(pool: &PgPool, config_id: Uuid, enabled: bool) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE copy_configs SET enabled = $2, updated_at = NOW() WHERE id = $1",
    )
    .bind(config_id)
    .bind(enabled)
    .execute(pool)
    .await?;

    Ok(())
}

/// Create or update the config for a (follower, target) pair.
pub async fn upsert_config(
    pool: &PgPool,
    follower_wallet: &str,
    target_trader_address: &str,
    target_trader_label: Option<&str>,
    copy_fraction: rust_decimal::Decimal,
) -> anyhow::Result<CopyConfig> {
    let config = sqlx::query_as::<_, CopyConfig>(
        r#"
        INSERT INTO copy_configs (follower_wallet, target_trader_address, target_trader_label, copy_fraction, enabled)
        VALUES ($1, $2, $3, $4, true)
        ON CONFLICT (follower_wallet, target_trader_address) DO UPDATE
            SET target_trader_label = $3, copy_fraction = $4, updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(follower_wallet)
    .bind(target_trader_address)
    .bind(target_trader_label)
    .bind(copy_fraction)
    .fetch_one(pool)
    .await?;

    Ok(config)
}
