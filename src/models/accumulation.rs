use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for accumulation_entries table.
///
/// At most one row per (follower, target, market, outcome). Invariant:
/// `accumulated_value_usd` is always below the minimum order size while
/// the row exists — the instant the running total clears the threshold
/// the entry is folded into a placed order and deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccumulationEntry {
    pub id: Uuid,
    pub follower_wallet: String,
    pub target_trader_address: String,
    pub market_id: String,
    pub token_id: String,
    pub outcome: String,
    pub accumulated_size: Decimal,
    pub accumulated_value_usd: Decimal,
    pub last_updated: Option<DateTime<Utc>>,
}
