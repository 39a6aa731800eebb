use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for position_snapshots table.
///
/// Append-only: one row per polling tick per (trader, market, outcome).
/// A zero-size row marks a closure so the next tick diffs against an
/// explicit empty state instead of a missing one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PositionSnapshot {
    pub id: Uuid,
    pub target_trader_address: String,
    pub market_id: String,
    pub token_id: String,
    pub outcome: String,
    pub size: Decimal,
    pub avg_entry_price: Decimal,
    pub captured_at: Option<DateTime<Utc>>,
}
