pub mod auth;
pub mod polymarket;
pub mod wallet;

pub use polymarket::PolymarketGateway;
pub use wallet::PolymarketWallet;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::Side;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("venue request timed out")]
    Timeout,

    #[error("venue rate limit hit")]
    RateLimited,

    #[error("order rejected by venue: {0}")]
    Rejected(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl GatewayError {
    /// Transient failures are retried on the next scheduled tick with no
    /// state change; permanent ones terminate the order as failed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout | GatewayError::RateLimited | GatewayError::Http(_)
        )
    }
}

/// A position held by a trader on the venue.
#[derive(Debug, Clone)]
pub struct VenuePosition {
    pub market_id: String,
    pub token_id: String,
    pub outcome: String,
    pub size: Decimal,
    pub avg_price: Decimal,
}

/// Top-of-book snapshot for one outcome token.
#[derive(Debug, Clone, Copy)]
pub struct MarketQuote {
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

impl MarketQuote {
    pub fn mid(&self) -> Decimal {
        (self.best_bid + self.best_ask) / Decimal::from(2)
    }

    pub fn spread(&self) -> Decimal {
        (self.best_ask - self.best_bid).max(Decimal::ZERO)
    }

    /// Spread as a percentage of mid price. Zero when the book is empty
    /// or crossed, which lands in the tight-spread regime.
    pub fn spread_pct(&self) -> Decimal {
        let mid = self.mid();
        if mid <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.spread() / mid * Decimal::from(100)
    }
}

/// Venue-side state of a working order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueOrderState {
    Open,
    Filled,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct VenueOrderStatus {
    pub state: VenueOrderState,
    pub filled_size: Decimal,
    pub avg_fill_price: Option<Decimal>,
}

/// Contract the engine consumes for all venue connectivity. Order
/// placement, cancellation, status lookup, market data and balances for
/// one wallet against one exchange; everything behind it is opaque.
#[async_trait]
pub trait VenueGateway: Send + Sync {
    /// All open positions currently held by `trader_address`.
    async fn get_positions(
        &self,
        trader_address: &str,
    ) -> Result<Vec<VenuePosition>, GatewayError>;

    /// Best bid/ask for one outcome token.
    async fn get_market_quote(&self, token_id: &str) -> Result<MarketQuote, GatewayError>;

    /// Submit a limit order; returns the venue order ID.
    async fn place_limit_order(
        &self,
        token_id: &str,
        side: Side,
        size: Decimal,
        price: Decimal,
    ) -> Result<String, GatewayError>;

    /// Submit a marketable order for immediate execution.
    async fn place_market_order(
        &self,
        token_id: &str,
        side: Side,
        size: Decimal,
    ) -> Result<String, GatewayError>;

    async fn cancel_order(&self, venue_order_id: &str) -> Result<(), GatewayError>;

    async fn get_order_status(
        &self,
        venue_order_id: &str,
    ) -> Result<VenueOrderStatus, GatewayError>;

    /// Available USDC balance for a wallet.
    async fn get_balance(&self, wallet: &str) -> Result<Decimal, GatewayError>;
}
