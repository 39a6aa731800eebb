use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use polymarket_client_sdk::clob::types::Side as SdkSide;
use polymarket_client_sdk::types::U256;
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::Side;

use super::auth::ClobCredentials;
use super::wallet::PolymarketWallet;
use super::{
    GatewayError, MarketQuote, VenueGateway, VenueOrderState, VenueOrderStatus, VenuePosition,
};

const CLOB_API_BASE: &str = "https://clob.polymarket.com";
const DATA_API_BASE: &str = "https://data-api.polymarket.com";

/// Bound on every venue round trip; a stuck call fails one unit of work,
/// never the whole tick.
const VENUE_TIMEOUT: Duration = Duration::from_secs(10);

/// Marketable limit prices used for forced market conversion. The CLOB
/// has no true market order type; a limit that crosses the whole book
/// fills at the best available levels.
const MARKETABLE_BUY_PRICE: &str = "0.99";
const MARKETABLE_SELL_PRICE: &str = "0.01";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPosition {
    pub market: Option<String>,
    pub asset_id: Option<String>,
    pub outcome: Option<String>,
    pub size: Option<Decimal>,
    pub avg_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiOrderBookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiOrderBook {
    #[serde(default)]
    pub bids: Vec<ApiOrderBookLevel>,
    #[serde(default)]
    pub asks: Vec<ApiOrderBookLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiOrder {
    pub status: Option<String>,
    #[serde(default)]
    pub size_matched: Option<Decimal>,
    #[serde(default)]
    pub original_size: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Polymarket implementation of [`VenueGateway`].
///
/// Read paths go over REST (public Data API for positions, HMAC-signed
/// CLOB API for books, order status and balances). Order placement and
/// cancellation go through the SDK wallet, which handles EIP-712 signing.
pub struct PolymarketGateway {
    http: Client,
    creds: ClobCredentials,
    wallet: Arc<PolymarketWallet>,
    clob_base: String,
    data_base: String,
}

impl PolymarketGateway {
    pub fn new(http: Client, creds: ClobCredentials, wallet: Arc<PolymarketWallet>) -> Self {
        Self {
            http,
            creds,
            wallet,
            clob_base: CLOB_API_BASE.into(),
            data_base: DATA_API_BASE.into(),
        }
    }

    /// Build an authenticated GET request with HMAC signature headers.
    fn authenticated_get(&self, path: &str) -> Result<RequestBuilder, GatewayError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self
            .creds
            .sign(&timestamp, "GET", path, "")
            .map_err(|e| GatewayError::Unexpected(e.to_string()))?;

        let url = format!("{}{}", self.clob_base, path);
        let req = self
            .http
            .get(&url)
            .header("POLY-API-KEY", &self.creds.api_key)
            .header("POLY-SIGNATURE", signature)
            .header("POLY-TIMESTAMP", &timestamp)
            .header("POLY-PASSPHRASE", &self.creds.passphrase);

        Ok(req)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let resp = tokio::time::timeout(VENUE_TIMEOUT, req.send())
            .await
            .map_err(|_| GatewayError::Timeout)??;

        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::RateLimited);
        }

        let resp = resp.error_for_status()?;
        let parsed = tokio::time::timeout(VENUE_TIMEOUT, resp.json::<T>())
            .await
            .map_err(|_| GatewayError::Timeout)??;

        Ok(parsed)
    }

    fn parse_token_id(token_id: &str) -> Result<U256, GatewayError> {
        U256::from_str_radix(token_id, 10)
            .or_else(|_| {
                // Try hex if decimal parse fails
                token_id
                    .strip_prefix("0x")
                    .map(|hex| U256::from_str_radix(hex, 16))
                    .unwrap_or_else(|| U256::from_str_radix(token_id, 16))
            })
            .map_err(|e| GatewayError::Unexpected(format!("invalid token id {token_id}: {e}")))
    }

    async fn submit_limit(
        &self,
        token_id: &str,
        side: Side,
        size: Decimal,
        price: Decimal,
    ) -> Result<String, GatewayError> {
        let sdk_side = match side {
            Side::Buy => SdkSide::Buy,
            Side::Sell => SdkSide::Sell,
        };
        let token_id_u256 = Self::parse_token_id(token_id)?;

        let client = self.wallet.client();
        let signer = self.wallet.signer();

        let submit = async {
            let signable_order = client
                .limit_order()
                .token_id(token_id_u256)
                .side(sdk_side)
                .price(price)
                .size(size)
                .build()
                .await
                .map_err(|e| GatewayError::Unexpected(e.to_string()))?;

            let signed_order = client
                .sign(signer, signable_order)
                .await
                .map_err(|e| GatewayError::Unexpected(e.to_string()))?;

            client
                .post_order(signed_order)
                .await
                .map_err(|e| GatewayError::Rejected(e.to_string()))
        };

        let response = tokio::time::timeout(VENUE_TIMEOUT, submit)
            .await
            .map_err(|_| GatewayError::Timeout)??;

        if !response.success {
            return Err(GatewayError::Rejected(
                response.error_msg.unwrap_or_else(|| "order rejected".into()),
            ));
        }

        tracing::info!(
            order_id = %response.order_id,
            token_id,
            side = %side,
            size = %size,
            price = %price,
            "Order submitted to CLOB"
        );

        Ok(response.order_id)
    }
}

#[async_trait]
impl VenueGateway for PolymarketGateway {
    async fn get_positions(
        &self,
        trader_address: &str,
    ) -> Result<Vec<VenuePosition>, GatewayError> {
        let url = format!("{}/positions", self.data_base);
        let req = self.http.get(&url).query(&[("user", trader_address)]);
        let raw: Vec<ApiPosition> = self.send_json(req).await?;

        let positions = raw
            .into_iter()
            .filter_map(|p| {
                let market_id = p.market?;
                let token_id = p.asset_id?;
                Some(VenuePosition {
                    market_id,
                    token_id,
                    outcome: p.outcome.unwrap_or_else(|| "YES".into()),
                    size: p.size.unwrap_or(Decimal::ZERO),
                    avg_price: p.avg_price.unwrap_or(Decimal::ZERO),
                })
            })
            .collect();

        Ok(positions)
    }

    async fn get_market_quote(&self, token_id: &str) -> Result<MarketQuote, GatewayError> {
        let path = format!("/book?token_id={token_id}");
        let book: ApiOrderBook = self.send_json(self.authenticated_get(&path)?).await?;

        // Book levels arrive best-first
        let best_bid = book
            .bids
            .first()
            .map(|l| l.price)
            .ok_or_else(|| GatewayError::Unexpected(format!("no bids for token {token_id}")))?;
        let best_ask = book
            .asks
            .first()
            .map(|l| l.price)
            .ok_or_else(|| GatewayError::Unexpected(format!("no asks for token {token_id}")))?;

        Ok(MarketQuote { best_bid, best_ask })
    }

    async fn place_limit_order(
        &self,
        token_id: &str,
        side: Side,
        size: Decimal,
        price: Decimal,
    ) -> Result<String, GatewayError> {
        self.submit_limit(token_id, side, size, price).await
    }

    async fn place_market_order(
        &self,
        token_id: &str,
        side: Side,
        size: Decimal,
    ) -> Result<String, GatewayError> {
        let price: Decimal = match side {
            Side::Buy => MARKETABLE_BUY_PRICE.parse().unwrap_or(Decimal::ONE),
            Side::Sell => MARKETABLE_SELL_PRICE.parse().unwrap_or(Decimal::ZERO),
        };
        self.submit_limit(token_id, side, size, price).await
    }

    async fn cancel_order(&self, venue_order_id: &str) -> Result<(), GatewayError> {
        let cancel = self.wallet.client().cancel_order(venue_order_id);
        tokio::time::timeout(VENUE_TIMEOUT, cancel)
            .await
            .map_err(|_| GatewayError::Timeout)?
            .map_err(|e| GatewayError::Unexpected(e.to_string()))?;

        tracing::info!(venue_order_id, "Order cancelled");
        Ok(())
    }

    async fn get_order_status(
        &self,
        venue_order_id: &str,
    ) -> Result<VenueOrderStatus, GatewayError> {
        let path = format!("/data/order/{venue_order_id}");
        let order: ApiOrder = self.send_json(self.authenticated_get(&path)?).await?;

        let state = match order.status.as_deref().map(str::to_uppercase).as_deref() {
            Some("MATCHED") => VenueOrderState::Filled,
            Some("CANCELED") | Some("CANCELLED") | Some("UNMATCHED") => VenueOrderState::Cancelled,
            Some("LIVE") | Some("DELAYED") => VenueOrderState::Open,
            other => {
                return Err(GatewayError::Unexpected(format!(
                    "unknown order status {other:?} for {venue_order_id}"
                )))
            }
        };

        Ok(VenueOrderStatus {
            state,
            filled_size: order.size_matched.unwrap_or(Decimal::ZERO),
            avg_fill_price: order.price,
        })
    }

    async fn get_balance(&self, _wallet: &str) -> Result<Decimal, GatewayError> {
        let address = self.wallet.address();
        let path = format!("/balance?address={address}");
        let resp: serde_json::Value = self.send_json(self.authenticated_get(&path)?).await?;

        // The response shape varies between deployments; try common field names
        let balance = resp
            .get("balance")
            .or_else(|| resp.get("available"))
            .and_then(|v| {
                v.as_str()
                    .and_then(|s| s.parse::<Decimal>().ok())
                    .or_else(|| v.as_f64().and_then(|f| Decimal::try_from(f).ok()))
            })
            .unwrap_or(Decimal::ZERO);

        Ok(balance)
    }
}
