use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle state of a copy order.
///
/// Allowed transitions:
///   Pending → Partial | Filled | Cancelled | Failed
///   Partial → Filled | Cancelled
/// Filled, Cancelled and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Partial,
    Filled,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Partial)
                | (Pending, Filled)
                | (Pending, Cancelled)
                | (Pending, Failed)
                | (Partial, Filled)
                | (Partial, Cancelled)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Partial => "partial",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Database row for pending_copy_orders table.
///
/// One logical copy decision. Cancel-replace re-quotes keep the same row
/// (stable `id`, evolving `venue_order_id` / `current_quoted_price`), so
/// a partially filled order carries its cumulative `filled_size` across
/// re-quotes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingCopyOrder {
    pub id: Uuid,
    pub follower_wallet: String,
    pub target_trader_address: String,
    pub market_id: String,
    pub token_id: String,
    pub outcome: String,
    pub order_side: String,
    pub target_size: Decimal,
    pub target_price: Decimal,
    pub initial_price: Decimal,
    pub current_quoted_price: Decimal,
    pub venue_order_id: Option<String>,
    pub status: OrderStatus,
    pub filled_size: Decimal,
    pub error_message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_price_adjustment_at: Option<DateTime<Utc>>,
    pub adjustment_count: i32,
}

impl PendingCopyOrder {
    /// Size still working on the venue (target minus cumulative fills).
    pub fn remaining_size(&self) -> Decimal {
        (self.target_size - self.filled_size).max(Decimal::ZERO)
    }
}
