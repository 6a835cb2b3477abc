use std::time::Duration;

/// Public CoinGecko API root.
pub const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3";
/// Public Solana mainnet RPC, used when no Helius key is configured.
pub const PUBLIC_SOLANA_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
/// Helius mainnet RPC root; the API key goes in the `api-key` query parameter.
pub const HELIUS_RPC_URL: &str = "https://mainnet.helius-rpc.com/";
/// Storage key for the persisted wallet record.
pub const WALLET_STATE_KEY: &str = "walletState";

/// Configuration for the bridge client.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Price API root (e.g. `https://api.coingecko.com/api/v3`).
    pub price_api_url: String,
    /// Solana JSON-RPC endpoint used for balance queries.
    pub solana_rpc_url: String,
    /// Key under which the wallet record is persisted.
    pub storage_key: String,
    /// Interval between price refreshes.
    pub price_interval: Duration,
    /// Interval between Solana balance polls.
    pub balance_interval: Duration,
    /// How long a connect error stays visible.
    pub error_display: Duration,
    /// Multiplier applied to every receive estimate (0.5% modeled fee).
    pub fee_factor: f64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            price_api_url: DEFAULT_PRICE_API_URL.into(),
            solana_rpc_url: PUBLIC_SOLANA_RPC_URL.into(),
            storage_key: WALLET_STATE_KEY.into(),
            price_interval: Duration::from_secs(30),
            balance_interval: Duration::from_secs(10),
            error_display: Duration::from_secs(5),
            fee_factor: 0.995,
        }
    }
}

impl BridgeConfig {
    /// Build a config from the process environment.
    ///
    /// `HELIUS_API_KEY` switches the Solana endpoint to Helius;
    /// `ZB_SOLANA_RPC_URL` and `ZB_PRICE_API_URL` override the endpoints outright.
    pub fn from_env() -> Self {
        let helius_key = std::env::var("HELIUS_API_KEY").ok();
        let mut config = Self {
            solana_rpc_url: solana_rpc_url(helius_key.as_deref()),
            ..Default::default()
        };
        if let Ok(url) = std::env::var("ZB_SOLANA_RPC_URL") {
            config.solana_rpc_url = url;
        }
        if let Ok(url) = std::env::var("ZB_PRICE_API_URL") {
            config.price_api_url = url;
        }
        config
    }
}

/// Resolve the Solana RPC endpoint for an optional Helius API key.
pub fn solana_rpc_url(helius_api_key: Option<&str>) -> String {
    match helius_api_key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => match url::Url::parse_with_params(HELIUS_RPC_URL, &[("api-key", key)]) {
            Ok(url) => url.to_string(),
            Err(_) => PUBLIC_SOLANA_RPC_URL.into(),
        },
        None => PUBLIC_SOLANA_RPC_URL.into(),
    }
}
