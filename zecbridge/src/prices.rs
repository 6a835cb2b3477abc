//! USD price snapshots for the bridge's asset set.
//!
//! Provides two interfaces:
//! - [`PriceClient`]: one-shot fetch of a [`TokenPrices`] snapshot.
//! - [`PriceFeed`]: background poller that publishes snapshots via a `watch`
//!   channel and keeps the last good snapshot when a fetch fails.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};
use crate::rest::HttpClient;
use crate::types::Asset;

/// USD price per tracked asset. `0.0` means "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct TokenPrices {
    pub btc: f64,
    pub eth: f64,
    pub sol: f64,
    pub bnb: f64,
    pub zec: f64,
}

impl TokenPrices {
    pub fn get(&self, asset: Asset) -> f64 {
        match asset {
            Asset::Btc => self.btc,
            Asset::Eth => self.eth,
            Asset::Sol => self.sol,
            Asset::Bnb => self.bnb,
            Asset::Zec => self.zec,
        }
    }

    fn set(&mut self, asset: Asset, price: f64) {
        let slot = match asset {
            Asset::Btc => &mut self.btc,
            Asset::Eth => &mut self.eth,
            Asset::Sol => &mut self.sol,
            Asset::Bnb => &mut self.bnb,
            Asset::Zec => &mut self.zec,
        };
        *slot = price;
    }

    /// Build a snapshot from a `simple/price` response body.
    ///
    /// Assets absent from the response (or without a `usd` field) price at 0.
    pub fn from_response(body: &SimplePriceResponse) -> Self {
        let mut prices = Self::default();
        for asset in Asset::ALL {
            let usd = body
                .get(asset.coingecko_id())
                .and_then(|q| q.usd)
                .filter(|p| p.is_finite())
                .unwrap_or(0.0);
            prices.set(asset, usd);
        }
        prices
    }
}

/// One coin entry of the `simple/price` response.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinQuote {
    #[serde(default)]
    pub usd: Option<f64>,
}

/// `{"bitcoin":{"usd":64000.0}, ...}`
pub type SimplePriceResponse = HashMap<String, CoinQuote>;

/// Client for the CoinGecko-compatible price endpoint.
#[derive(Debug, Clone)]
pub struct PriceClient {
    http: HttpClient,
}

impl PriceClient {
    pub fn new(price_api_url: &str) -> Self {
        Self {
            http: HttpClient::new(price_api_url),
        }
    }

    /// GET /simple/price for every tracked asset in USD.
    ///
    /// Any failure (non-2xx, network, undecodable body) maps to
    /// [`BridgeError::PriceFetch`].
    pub async fn fetch_prices(&self) -> Result<TokenPrices> {
        let ids = Asset::ALL
            .iter()
            .map(|a| a.coingecko_id())
            .collect::<Vec<_>>()
            .join(",");

        let body: SimplePriceResponse = self
            .http
            .get("/simple/price", &[("ids", ids.as_str()), ("vs_currencies", "usd")])
            .await
            .map_err(|e| match e {
                BridgeError::Http { status, message } => BridgeError::PriceFetch { status, message },
                other => BridgeError::PriceFetch {
                    status: 0,
                    message: other.to_string(),
                },
            })?;

        Ok(TokenPrices::from_response(&body))
    }
}

/// Live price snapshot, published via `watch` channel.
///
/// Fetches once on [`start`](Self::start) and then on every interval tick
/// until [`close`](Self::close) is called or the feed is dropped.
pub struct PriceFeed {
    client: PriceClient,
    interval: Duration,
    prices_tx: watch::Sender<TokenPrices>,
    prices_rx: watch::Receiver<TokenPrices>,
    cancel: CancellationToken,
}

impl PriceFeed {
    /// Create a new feed. Does **not** poll yet; call [`start`](Self::start).
    pub fn new(client: PriceClient, interval: Duration) -> Self {
        let (prices_tx, prices_rx) = watch::channel(TokenPrices::default());
        Self {
            client,
            interval,
            prices_tx,
            prices_rx,
            cancel: CancellationToken::new(),
        }
    }

    /// Spawn the polling task.
    pub fn start(&self) {
        let client = self.client.clone();
        let tx = self.prices_tx.clone();
        let cancel = self.cancel.clone();
        let period = self.interval;

        tokio::spawn(async move {
            info!(interval = ?period, "price feed starting");
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        refresh(&client, &tx).await;
                    }
                    _ = cancel.cancelled() => {
                        info!("price feed stopped");
                        return;
                    }
                }
            }
        });
    }

    /// Fetch once outside the timer and publish on success.
    pub async fn refresh_now(&self) -> Result<TokenPrices> {
        let prices = self.client.fetch_prices().await?;
        self.prices_tx.send_replace(prices);
        Ok(prices)
    }

    /// Latest snapshot.
    pub fn latest(&self) -> TokenPrices {
        *self.prices_rx.borrow()
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<TokenPrices> {
        self.prices_rx.clone()
    }

    /// Stop the polling task.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PriceFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn refresh(client: &PriceClient, tx: &watch::Sender<TokenPrices>) {
    match client.fetch_prices().await {
        Ok(prices) => {
            debug!(
                btc = prices.btc,
                eth = prices.eth,
                sol = prices.sol,
                bnb = prices.bnb,
                zec = prices.zec,
                "prices updated"
            );
            tx.send_replace(prices);
        }
        Err(e) => {
            // Keep the previous snapshot untouched.
            warn!(error = %e, "price fetch failed, keeping previous prices");
        }
    }
}
