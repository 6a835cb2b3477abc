//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;
use zecbridge::{ChainKind, ProviderError, WalletProvider};

pub const SOL_PUBKEY: &str = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T";
pub const ETH_ADDRESS: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
pub const ETH_ADDRESS_2: &str = "0xde709f2102306220921060314715629080e2fb77";
pub const BTC_ADDRESS: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

/// Scriptable provider that records how it was used.
pub struct MockProvider {
    name: String,
    chain: ChainKind,
    response: Mutex<Result<Vec<String>, ProviderError>>,
    can_disconnect: bool,
    accounts_tx: Option<broadcast::Sender<Vec<String>>>,
    pub request_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
}

impl MockProvider {
    pub fn ok(chain: ChainKind, name: &str, address: &str) -> Self {
        Self::with_response(chain, name, Ok(vec![address.to_string()]))
    }

    pub fn failing(chain: ChainKind, name: &str, err: ProviderError) -> Self {
        Self::with_response(chain, name, Err(err))
    }

    fn with_response(
        chain: ChainKind,
        name: &str,
        response: Result<Vec<String>, ProviderError>,
    ) -> Self {
        Self {
            name: name.to_string(),
            chain,
            response: Mutex::new(response),
            can_disconnect: false,
            accounts_tx: None,
            request_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_disconnect(mut self) -> Self {
        self.can_disconnect = true;
        self
    }

    /// Enable account-change events; returns the sender used to emit them.
    pub fn with_account_events(mut self) -> (Self, broadcast::Sender<Vec<String>>) {
        let (tx, _) = broadcast::channel(16);
        self.accounts_tx = Some(tx.clone());
        (self, tx)
    }

    pub fn set_response(&self, response: Result<Vec<String>, ProviderError>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn requests(&self) -> usize {
        self.request_calls.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl WalletProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn chain(&self) -> ChainKind {
        self.chain
    }

    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError> {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        self.response.lock().unwrap().clone()
    }

    fn supports_disconnect(&self) -> bool {
        self.can_disconnect
    }

    async fn disconnect(&self) -> Result<(), ProviderError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn account_changes(&self) -> Option<broadcast::Receiver<Vec<String>>> {
        self.accounts_tx.as_ref().map(|tx| tx.subscribe())
    }
}
