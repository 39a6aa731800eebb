use std::str::FromStr;

use alloy::signers::local::PrivateKeySigner;
use polymarket_client_sdk::auth::state::Authenticated;
use polymarket_client_sdk::auth::{Normal, Signer};
use polymarket_client_sdk::clob::client::{Client, Config};
use polymarket_client_sdk::POLYGON;

type AuthedClient = Client<Authenticated<Normal>>;

/// Order-signing identity for the venue: a Polygon key plus the SDK
/// client that completed CLOB authentication with it. Only the gateway
/// touches the client and signer.
pub struct PolymarketWallet {
    signer: PrivateKeySigner,
    client: AuthedClient,
}

impl PolymarketWallet {
    /// Authenticate against the CLOB with a hex-encoded private key
    /// (`0x` prefix optional), deriving an API key if the venue has
    /// none on record for this address.
    pub async fn new(private_key: &str) -> anyhow::Result<Self> {
        let signer = PrivateKeySigner::from_str(private_key)?.with_chain_id(Some(POLYGON));

        let client = Client::new("https://clob.polymarket.com", Config::default())?
            .authentication_builder(&signer)
            .authenticate()
            .await?;

        Ok(Self { signer, client })
    }

    /// The wallet's checksummed Polygon address.
    pub fn address(&self) -> String {
        self.client.address().to_string()
    }

    pub(crate) fn client(&self) -> &AuthedClient {
        &self.client
    }

    pub(crate) fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}
