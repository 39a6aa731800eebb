use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for executed_copy_trades table.
///
/// Append-only execution history; written exactly once per order that
/// reaches the filled state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutedCopyTrade {
    pub id: Uuid,
    pub follower_wallet: String,
    pub target_trader_address: String,
    pub market_id: String,
    pub token_id: String,
    pub outcome: String,
    pub order_side: String,
    pub size: Decimal,
    pub fill_price: Decimal,
    pub target_price: Decimal,
    pub slippage: Decimal,
    pub realized_pnl: Decimal,
    pub venue_order_id: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
}

/// Aggregate realized performance per target trader, for the external
/// status surface.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TargetPnl {
    pub target_trader_address: String,
    pub trade_count: i64,
    pub total_realized_pnl: Decimal,
    pub avg_slippage: Decimal,
}
