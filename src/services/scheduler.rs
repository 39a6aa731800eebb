use std::sync::Arc;

use sqlx::PgPool;
use tokio::time::{interval, Duration};

use crate::engine::{copy_engine, order_manager, EngineConfig};
use crate::gateway::VenueGateway;

/// Run the copy-trading tick loop. Each tick polls target traders for
/// position changes, then walks every working order through its
/// lifecycle. The two phases run sequentially so an order placed this
/// tick is never immediately re-quoted by the same tick.
pub async fn run_copy_scheduler(
    pool: PgPool,
    gateway: Arc<dyn VenueGateway>,
    config: EngineConfig,
    interval_secs: u64,
) {
    let mut ticker = interval(Duration::from_secs(interval_secs));

    tracing::info!(
        interval_secs,
        min_order_usd = %config.min_order_usd,
        dry_run = config.dry_run,
        "Copy scheduler started"
    );

    loop {
        ticker.tick().await;

        if let Err(e) = copy_engine::monitor_positions(&pool, gateway.as_ref(), &config).await {
            tracing::error!(error = %e, "Monitoring tick failed");
        }

        let now = chrono::Utc::now();
        if let Err(e) =
            order_manager::manage_pending_orders(&pool, gateway.as_ref(), &config, now).await
        {
            tracing::error!(error = %e, "Order management tick failed");
        }
    }
}
