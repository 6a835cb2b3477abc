//! Wallet provider abstraction.
//!
//! A provider is whatever hands out accounts for one chain family: an
//! injected browser extension bridged in from a host, a hardware wallet, or
//! the [`WatchOnlyProvider`] used by the CLI. The session manager only talks
//! to providers through [`WalletProvider`] and finds them through
//! [`ProviderRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::{BridgeError, Result};
use crate::types::ChainKind;

/// EIP-1193 "user rejected request", reused by Solana and Bitcoin wallets.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Error reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(Some(USER_REJECTED_CODE), "User rejected the request.")
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == Some(USER_REJECTED_CODE)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// One wallet provider for a single chain family.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Provider name for logs (e.g. `"phantom"`, `"unisat"`).
    fn name(&self) -> &str;

    /// Chain family this provider serves.
    fn chain(&self) -> ChainKind;

    /// Ask the wallet for account access. The first account is the one used.
    async fn request_accounts(&self) -> std::result::Result<Vec<String>, ProviderError>;

    /// Whether [`disconnect`](Self::disconnect) does anything.
    fn supports_disconnect(&self) -> bool {
        false
    }

    async fn disconnect(&self) -> std::result::Result<(), ProviderError> {
        Ok(())
    }

    /// Account-change notifications, for providers that emit them.
    fn account_changes(&self) -> Option<broadcast::Receiver<Vec<String>>> {
        None
    }
}

/// Registered providers, looked up per chain family.
///
/// Bitcoin keeps an ordered list: the session tries each in turn.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ChainKind, Vec<Arc<dyn WalletProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own chain. Later registrations for the
    /// same chain act as fallbacks.
    pub fn register(&mut self, provider: Arc<dyn WalletProvider>) -> &mut Self {
        self.providers
            .entry(provider.chain())
            .or_default()
            .push(provider);
        self
    }

    pub fn with(mut self, provider: Arc<dyn WalletProvider>) -> Self {
        self.register(provider);
        self
    }

    /// First provider for `chain`, or [`BridgeError::ProviderNotFound`].
    pub fn lookup(&self, chain: ChainKind) -> Result<Arc<dyn WalletProvider>> {
        self.candidates(chain)
            .first()
            .cloned()
            .ok_or(BridgeError::ProviderNotFound(chain))
    }

    /// All providers for `chain`, in registration order.
    pub fn candidates(&self, chain: ChainKind) -> &[Arc<dyn WalletProvider>] {
        self.providers
            .get(&chain)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (chain, list) in &self.providers {
            let names: Vec<_> = list.iter().map(|p| p.name().to_string()).collect();
            map.entry(chain, &names);
        }
        map.finish()
    }
}

/// Provider backed by a fixed, already-known address.
///
/// Connecting never prompts; the address is validated against the chain's
/// format when the provider is built.
#[derive(Debug, Clone)]
pub struct WatchOnlyProvider {
    chain: ChainKind,
    address: String,
}

impl WatchOnlyProvider {
    pub fn new(chain: ChainKind, address: &str) -> Result<Self> {
        let address = address.trim();
        validate_address(chain, address)?;
        Ok(Self {
            chain,
            address: address.to_string(),
        })
    }
}

#[async_trait]
impl WalletProvider for WatchOnlyProvider {
    fn name(&self) -> &str {
        "watch-only"
    }

    fn chain(&self) -> ChainKind {
        self.chain
    }

    async fn request_accounts(&self) -> std::result::Result<Vec<String>, ProviderError> {
        Ok(vec![self.address.clone()])
    }
}

/// Check an address against the expected format for `chain`.
///
/// - Solana: base58 of a 32-byte public key.
/// - Ethereum: `0x` followed by 40 hex digits.
/// - Bitcoin: non-empty ASCII alphanumeric (legacy, P2SH and bech32 alike).
pub fn validate_address(chain: ChainKind, address: &str) -> Result<()> {
    let ok = match chain {
        ChainKind::Solana => bs58::decode(address)
            .into_vec()
            .map(|bytes| bytes.len() == 32)
            .unwrap_or(false),
        ChainKind::Ethereum => address
            .strip_prefix("0x")
            .filter(|h| h.len() == 40)
            .map(|h| hex::decode(h).is_ok())
            .unwrap_or(false),
        ChainKind::Bitcoin => {
            (14..=90).contains(&address.len())
                && address.chars().all(|c| c.is_ascii_alphanumeric())
        }
    };
    if ok {
        Ok(())
    } else {
        Err(BridgeError::Validation(format!(
            "invalid {chain} address: {address}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOL_ADDR: &str = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T";
    const ETH_ADDR: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
    const BTC_ADDR: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

    #[test]
    fn test_validate_addresses() {
        assert!(validate_address(ChainKind::Solana, SOL_ADDR).is_ok());
        assert!(validate_address(ChainKind::Ethereum, ETH_ADDR).is_ok());
        assert!(validate_address(ChainKind::Bitcoin, BTC_ADDR).is_ok());
    }

    #[test]
    fn test_validate_rejects_cross_chain_addresses() {
        assert!(validate_address(ChainKind::Solana, ETH_ADDR).is_err());
        assert!(validate_address(ChainKind::Ethereum, SOL_ADDR).is_err());
        assert!(validate_address(ChainKind::Ethereum, "0x1234").is_err());
        assert!(validate_address(ChainKind::Bitcoin, "").is_err());
    }

    #[test]
    fn test_lookup_missing_chain() {
        let registry = ProviderRegistry::new();
        match registry.lookup(ChainKind::Ethereum) {
            Err(BridgeError::ProviderNotFound(ChainKind::Ethereum)) => {}
            other => panic!("expected ProviderNotFound, got {:?}", other.map(|p| p.name().to_string())),
        }
    }

    #[test]
    fn test_registry_keeps_fallback_order() {
        let a = WatchOnlyProvider::new(ChainKind::Bitcoin, BTC_ADDR).unwrap();
        let b = WatchOnlyProvider::new(ChainKind::Bitcoin, "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2").unwrap();
        let registry = ProviderRegistry::new()
            .with(Arc::new(a))
            .with(Arc::new(b));
        assert_eq!(registry.candidates(ChainKind::Bitcoin).len(), 2);
        assert!(registry.candidates(ChainKind::Solana).is_empty());
    }

    #[tokio::test]
    async fn test_watch_only_returns_its_address() {
        let p = WatchOnlyProvider::new(ChainKind::Solana, SOL_ADDR).unwrap();
        assert_eq!(p.request_accounts().await.unwrap(), vec![SOL_ADDR.to_string()]);
        assert!(!p.supports_disconnect());
    }

    #[test]
    fn test_user_rejection_code() {
        assert!(ProviderError::user_rejected().is_user_rejection());
        assert!(!ProviderError::new(Some(-32002), "pending").is_user_rejection());
    }
}
