use metrics::counter;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::accumulation_repo::{self, AccumulationKey};
use crate::db::order_repo::NewOrder;
use crate::db::{config_repo, snapshot_repo};
use crate::gateway::{VenueGateway, VenuePosition};
use crate::models::{CopyConfig, Side};

use super::accumulation::{self, AccumulationDecision};
use super::delta::{self, PositionChange};
use super::order_manager;
use super::pricing::PricingConfig;

/// Engine-wide knobs. Everything else (who to copy, at what fraction)
/// lives in `copy_configs` rows.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Venue minimum order value; sub-minimum copies accumulate.
    pub min_order_usd: Decimal,
    pub pricing: PricingConfig,
    /// Log intended orders without touching the venue or the ledger.
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_order_usd: Decimal::new(50, 2), // $0.50
            pricing: PricingConfig::default(),
            dry_run: false,
        }
    }
}

/// One monitoring tick: poll every enabled target trader, diff against
/// their last snapshot, and copy each classified change. Targets are
/// polled concurrently and isolated — one failing target never stalls
/// the rest, and its snapshot is left untouched so the missed deltas
/// surface on the next tick.
pub async fn monitor_positions(
    pool: &PgPool,
    gateway: &dyn VenueGateway,
    config: &EngineConfig,
) -> anyhow::Result<()> {
    let configs = config_repo::get_enabled_configs(pool).await?;

    if configs.is_empty() {
        tracing::debug!("No enabled copy configs");
        return Ok(());
    }

    tracing::debug!(targets = configs.len(), "Polling target traders");

    let results = futures_util::future::join_all(
        configs
            .iter()
            .map(|cfg| monitor_target(pool, gateway, cfg, config)),
    )
    .await;

    for (cfg, result) in configs.iter().zip(results) {
        if let Err(e) = result {
            tracing::error!(
                error = %e,
                target = %cfg.target_trader_address,
                label = cfg.label(),
                "Target monitoring tick failed"
            );
        }
    }

    Ok(())
}

async fn monitor_target(
    pool: &PgPool,
    gateway: &dyn VenueGateway,
    cfg: &CopyConfig,
    config: &EngineConfig,
) -> anyhow::Result<()> {
    let positions = gateway.get_positions(&cfg.target_trader_address).await?;
    let prev = snapshot_repo::latest_snapshot(pool, &cfg.target_trader_address).await?;
    let changes = delta::classify_changes(&prev, &positions);

    if changes.is_empty() {
        tracing::debug!(
            target = %cfg.target_trader_address,
            positions = positions.len(),
            "No position changes"
        );
    }

    for change in &changes {
        counter!("position_changes_total").increment(1);
        tracing::info!(
            target = %cfg.target_trader_address,
            label = cfg.label(),
            kind = %change.kind,
            market = %change.market_id,
            outcome = %change.outcome,
            size_delta = %change.size_delta,
            price = %change.price,
            "Position change detected"
        );

        if let Err(e) = execute_copy_event(pool, gateway, cfg, config, change).await {
            tracing::error!(
                error = %e,
                target = %cfg.target_trader_address,
                market = %change.market_id,
                "Failed to copy position change"
            );
        }
    }

    // The new snapshot carries explicit zero-size rows for closed
    // positions so a closure is recorded once and never re-detected.
    let mut snapshot = positions;
    for change in &changes {
        if change.kind == delta::ChangeKind::Closed
            && !snapshot.iter().any(|p| p.token_id == change.token_id)
        {
            snapshot.push(VenuePosition {
                market_id: change.market_id.clone(),
                token_id: change.token_id.clone(),
                outcome: change.outcome.clone(),
                size: Decimal::ZERO,
                avg_price: change.price,
            });
        }
    }
    snapshot_repo::insert_snapshot(pool, &cfg.target_trader_address, &snapshot).await?;

    Ok(())
}

/// Copy one classified change: scale it by the config's fraction, run
/// it through the minimum-order rule, and place whatever clears.
///
/// The ledger entry for the key is only deleted once the venue accepts
/// the order; a failed or skipped placement stashes the combined total
/// back instead, so the value rides along with the next event even
/// after the snapshot erases this delta.
async fn execute_copy_event(
    pool: &PgPool,
    gateway: &dyn VenueGateway,
    cfg: &CopyConfig,
    config: &EngineConfig,
    change: &PositionChange,
) -> anyhow::Result<()> {
    let copy_size = change.size_delta * cfg.copy_fraction;
    let copy_value = copy_size * change.price;

    if copy_size <= Decimal::ZERO {
        return Ok(());
    }

    // A sell or closure by the target invalidates our buy-side intent
    // for that token before anything else happens.
    if change.side == Side::Sell {
        order_manager::cancel_stale_buys(
            pool,
            gateway,
            &cfg.follower_wallet,
            &change.market_id,
            &change.token_id,
        )
        .await?;
    }

    let key = AccumulationKey {
        follower_wallet: &cfg.follower_wallet,
        target_trader_address: &cfg.target_trader_address,
        market_id: &change.market_id,
        token_id: &change.token_id,
        outcome: &change.outcome,
    };

    let mut tx = pool.begin().await?;
    let carried = accumulation_repo::lock_entry(&mut tx, key).await?;
    let decision =
        accumulation::apply_minimum_order_rule(copy_size, copy_value, carried, config.min_order_usd);

    let (order_size, order_value, folded) = match decision {
        AccumulationDecision::Defer { size, value_usd } => {
            accumulation_repo::upsert_entry(&mut tx, key, size, value_usd).await?;
            tx.commit().await?;
            counter!("accumulation_deferrals").increment(1);
            tracing::info!(
                market = %change.market_id,
                outcome = %change.outcome,
                accumulated_size = %size,
                accumulated_value = %value_usd,
                min_order_usd = %config.min_order_usd,
                "Copy below venue minimum — accumulating"
            );
            return Ok(());
        }
        AccumulationDecision::Place { size, value_usd, folded } => {
            // The ledger entry stays until the venue accepts the order;
            // committing here only releases the key lock.
            tx.commit().await?;
            (size, value_usd, folded)
        }
    };

    if change.side == Side::Buy && !config.dry_run {
        let balance = gateway.get_balance(&cfg.follower_wallet).await?;
        if balance < order_value {
            tracing::warn!(
                follower = %cfg.follower_wallet,
                market = %change.market_id,
                needed = %order_value,
                balance = %balance,
                "Insufficient balance — deferring copy event"
            );
            counter!("copies_skipped_balance").increment(1);
            stash_total(pool, key, order_size, order_value).await?;
            return Ok(());
        }
    }

    if folded {
        tracing::info!(
            market = %change.market_id,
            outcome = %change.outcome,
            order_size = %order_size,
            "Accumulated total cleared the minimum — folding into this order"
        );
    }

    let placement = order_manager::open_order(
        pool,
        gateway,
        config,
        NewOrder {
            follower_wallet: &cfg.follower_wallet,
            target_trader_address: &cfg.target_trader_address,
            market_id: &change.market_id,
            token_id: &change.token_id,
            outcome: &change.outcome,
            side: change.side,
            target_size: order_size,
            target_price: change.price,
            initial_price: change.price,
        },
    )
    .await;

    match placement {
        Ok(_) => {
            if folded {
                let mut tx = pool.begin().await?;
                accumulation_repo::delete_entry(&mut tx, key).await?;
                tx.commit().await?;
            }
            Ok(())
        }
        Err(e) => {
            // Transient venue failure after the fold decision: stash the
            // whole total back in the ledger so the snapshot written next
            // does not erase it. It rides along with the next event on
            // this key.
            stash_total(pool, key, order_size, order_value).await?;
            Err(e)
        }
    }
}

async fn stash_total(
    pool: &PgPool,
    key: AccumulationKey<'_>,
    size: Decimal,
    value_usd: Decimal,
) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    accumulation_repo::upsert_entry(&mut tx, key, size, value_usd).await?;
    tx.commit().await?;
    Ok(())
}

/// Flip a copy config on or off. Disabling also cancels every open
/// order for the pair so nothing keeps working for a dead config.
pub async fn set_config_enabled(
    pool: &PgPool,
    gateway: &dyn VenueGateway,
    config_id: Uuid,
    enabled: bool,
) -> anyhow::Result<()> {
    let Some(cfg) = config_repo::get_config(pool, config_id).await? else {
        anyhow::bail!("copy config {config_id} not found");
    };

    config_repo::set_enabled(pool, config_id, enabled).await?;

    if !enabled {
        let cancelled = order_manager::cancel_open_orders_for_pair(
            pool,
            gateway,
            &cfg.follower_wallet,
            &cfg.target_trader_address,
        )
        .await?;
        tracing::info!(
            config_id = %config_id,
            target = %cfg.target_trader_address,
            cancelled,
            "Copy config disabled"
        );
    } else {
        tracing::info!(config_id = %config_id, target = %cfg.target_trader_address, "Copy config enabled");
    }

    Ok(())
}
