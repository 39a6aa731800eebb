use std::sync::Arc;

use polycopy::config::AppConfig;
use polycopy::gateway::auth::ClobCredentials;
use polycopy::gateway::polymarket::PolymarketGateway;
use polycopy::gateway::wallet::PolymarketWallet;
use polycopy::services::scheduler::run_copy_scheduler;
use polycopy::{db, metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;

    metrics::init_metrics(config.metrics_port)?;

    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    if !config.has_polymarket_auth() {
        anyhow::bail!(
            "POLYMARKET_API_KEY, POLYMARKET_API_SECRET, POLYMARKET_PASSPHRASE and \
             POLYMARKET_PRIVATE_KEY must all be set"
        );
    }

    // has_polymarket_auth() guarantees these are present
    let creds = ClobCredentials::new(
        config.polymarket_api_key.clone().unwrap_or_default(),
        config.polymarket_api_secret.clone().unwrap_or_default(),
        config.polymarket_passphrase.clone().unwrap_or_default(),
    );
    let private_key = config.polymarket_private_key.clone().unwrap_or_default();

    tracing::info!("Authenticating with Polymarket CLOB...");
    let wallet = Arc::new(PolymarketWallet::new(&private_key).await?);
    let gateway = Arc::new(PolymarketGateway::new(reqwest::Client::new(), creds, wallet));
    tracing::info!("CLOB authentication complete");

    if config.dry_run {
        tracing::warn!("DRY_RUN enabled — orders will be logged, not placed");
    }

    run_copy_scheduler(
        pool,
        gateway,
        config.engine_config(),
        config.poll_interval_secs,
    )
    .await;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
