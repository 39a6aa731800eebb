use rust_decimal::Decimal;
use std::env;

use crate::engine::pricing::{EscalationWindows, PricingConfig};
use crate::engine::EngineConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,

    // Polymarket API credentials (required for authenticated endpoints)
    pub polymarket_api_key: Option<String>,
    pub polymarket_api_secret: Option<String>,
    pub polymarket_passphrase: Option<String>,
    /// Hex-encoded signing key for order placement.
    pub polymarket_private_key: Option<String>,

    // Engine
    pub poll_interval_secs: u64,
    pub min_order_usd: Decimal,
    pub dry_run: bool,
    pub escalation_windows: EscalationWindows,

    // Observability
    pub metrics_port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,

            polymarket_api_key: env::var("POLYMARKET_API_KEY").ok(),
            polymarket_api_secret: env::var("POLYMARKET_API_SECRET").ok(),
            polymarket_passphrase: env::var("POLYMARKET_PASSPHRASE").ok(),
            polymarket_private_key: env::var("POLYMARKET_PRIVATE_KEY").ok(),

            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".into())
                .parse()
                .unwrap_or(300),
            min_order_usd: env::var("MIN_ORDER_USD")
                .unwrap_or_else(|_| "0.50".into())
                .parse()
                .unwrap_or(Decimal::new(50, 2)),
            dry_run: env::var("DRY_RUN")
                .unwrap_or_else(|_| "false".into())
                .parse()
                .unwrap_or(false),
            escalation_windows: EscalationWindows {
                patient_h: env_f64("ESCALATION_PATIENT_HOURS", 6.0),
                balanced_h: env_f64("ESCALATION_BALANCED_HOURS", 12.0),
                aggressive_h: env_f64("ESCALATION_AGGRESSIVE_HOURS", 24.0),
                market_h: env_f64("ESCALATION_MARKET_HOURS", 36.0),
            },

            metrics_port: env::var("METRICS_PORT")
                .unwrap_or_else(|_| "9090".into())
                .parse()?,
        })
    }

    /// Returns true if all Polymarket API credentials are configured.
    pub fn has_polymarket_auth(&self) -> bool {
        self.polymarket_api_key.is_some()
            && self.polymarket_api_secret.is_some()
            && self.polymarket_passphrase.is_some()
            && self.polymarket_private_key.is_some()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            min_order_usd: self.min_order_usd,
            pricing: PricingConfig {
                windows: self.escalation_windows,
                ..PricingConfig::default()
            },
            dry_run: self.dry_run,
        }
    }
}

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
