use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for copy_configs table.
///
/// One row per (follower, target trader) pair. `copy_fraction` is the
/// proportion (0, 1] of the target's share delta that gets replicated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CopyConfig {
    pub id: Uuid,
    pub follower_wallet: String,
    pub target_trader_address: String,
    pub target_trader_label: Option<String>,
    pub copy_fraction: Decimal,
    pub enabled: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CopyConfig {
    /// Short display label for logs: the operator-assigned name, or a
    /// truncated address when none is set.
    pub fn label(&self) -> &str {
        match self.target_trader_label.as_deref() {
            Some(l) if !l.is_empty() => l,
            _ => {
                let addr = &self.target_trader_address;
                &addr[..10.min(addr.len())]
            }
        }
    }
}
