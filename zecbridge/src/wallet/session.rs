//! Wallet session manager.
//!
//! Owns the single [`WalletState`] record. Every change goes through one
//! `watch` channel write that also mirrors the record into the
//! [`KeyValueStore`], so subscribers and storage never see a half-applied
//! update. Chain-specific background work (Solana balance polling, Ethereum
//! account-change handling) lives in tasks scoped to the current session and
//! is canceled when the session ends or switches chain.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::solana::SolanaRpc;
use crate::types::ChainKind;
use crate::wallet::provider::{ProviderError, ProviderRegistry, WalletProvider};
use crate::wallet::state::{WalletState, WalletStatePatch};
use crate::wallet::storage::KeyValueStore;

/// Provider and background tasks belonging to the current session.
struct ActiveSession {
    provider: Option<Arc<dyn WalletProvider>>,
    cancel: CancellationToken,
}

struct Inner {
    registry: ProviderRegistry,
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
    balance_interval: Duration,
    rpc: SolanaRpc,
    state_tx: watch::Sender<WalletState>,
    active: Mutex<Option<ActiveSession>>,
    shutdown: CancellationToken,
}

/// Single-writer owner of the wallet session.
///
/// Share it behind an `Arc`; dropping the last handle stops every background
/// task the session started.
pub struct WalletSession {
    inner: Arc<Inner>,
}

impl WalletSession {
    /// Create the manager and hydrate it from `store`.
    ///
    /// A stored record that fails to parse (or breaks the one-chain invariant)
    /// is logged, removed and replaced by the empty state. A restored
    /// connected record gets its chain's background tasks re-attached.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: &BridgeConfig,
        registry: ProviderRegistry,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let initial = match load_persisted(store.as_ref(), &config.storage_key) {
            Ok(Some(state)) => {
                info!(chain = ?state.wallet_type, address = %state.address, "restored wallet session");
                state
            }
            Ok(None) => WalletState::empty(),
            Err(e) => {
                error!(error = %e, "failed to load wallet state, starting disconnected");
                if let Err(e) = store.remove(&config.storage_key) {
                    warn!(error = %e, "failed to discard malformed wallet state");
                }
                WalletState::empty()
            }
        };

        let shutdown = CancellationToken::new();
        let (state_tx, _) = watch::channel(initial.clone());

        let inner = Arc::new(Inner {
            registry,
            store,
            storage_key: config.storage_key.clone(),
            balance_interval: config.balance_interval,
            rpc: SolanaRpc::new(&config.solana_rpc_url),
            state_tx,
            active: Mutex::new(None),
            shutdown,
        });

        if let Some(chain) = initial.wallet_type.filter(|_| initial.is_connected) {
            let provider = inner.registry.lookup(chain).ok();
            let cancel = inner.shutdown.child_token();
            inner.spawn_watchers(&initial, provider.as_ref(), &cancel);
            // Nothing else can hold the lock yet.
            if let Ok(mut active) = inner.active.try_lock() {
                *active = Some(ActiveSession { provider, cancel });
            }
        }

        Self { inner }
    }

    /// Snapshot of the current record.
    pub fn state(&self) -> WalletState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribe to record changes.
    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.inner.state_tx.subscribe()
    }

    /// Connect to `chain` through its registered provider(s).
    ///
    /// On success the whole record is replaced in one step. On any error the
    /// record is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ProviderNotFound`] when no provider serves `chain`
    ///   (for Bitcoin: when every registered provider failed).
    /// - [`BridgeError::UserRejected`] when the wallet reports code 4001.
    /// - [`BridgeError::Provider`] for any other provider failure.
    pub async fn connect(&self, chain: ChainKind) -> Result<WalletState> {
        self.inner.connect(chain).await
    }

    /// End the session: call the provider's disconnect when it has one, reset
    /// to the empty record and drop the persisted copy.
    pub async fn disconnect(&self) {
        self.inner.disconnect().await;
    }

    /// Re-query balances for the connected chain.
    ///
    /// Only Solana balances are wired up; Ethereum and Bitcoin sessions keep
    /// `None` balances. A failed query is logged and the last balance kept.
    pub async fn refresh_balances(&self) {
        self.inner.refresh_balances().await;
    }

    /// Merge a partial update into the record in one step.
    ///
    /// Patches that would leave the record inconsistent (identifier not
    /// matching `type`) are rejected with [`BridgeError::Validation`]. A patch
    /// that moves the session to another chain, account or connection state
    /// restarts the chain's background tasks.
    pub async fn set_state(&self, patch: WalletStatePatch) -> Result<WalletState> {
        self.inner.set_state(patch).await
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    async fn connect(self: &Arc<Self>, chain: ChainKind) -> Result<WalletState> {
        let (provider, address) = match self.handshake(chain).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!(chain = %chain, error = %e, "wallet connection failed");
                return Err(e);
            }
        };

        let state = WalletState::connected(chain, address);

        let mut active = self.active.lock().await;
        if let Some(prev) = active.take() {
            prev.cancel.cancel();
        }
        self.replace(state.clone());

        let cancel = self.shutdown.child_token();
        self.spawn_watchers(&state, Some(&provider), &cancel);
        *active = Some(ActiveSession {
            provider: Some(Arc::clone(&provider)),
            cancel,
        });

        info!(chain = %chain, provider = provider.name(), address = %state.address, "wallet connected");
        Ok(state)
    }

    /// Ask the chain's provider(s) for an account.
    async fn handshake(&self, chain: ChainKind) -> Result<(Arc<dyn WalletProvider>, String)> {
        match chain {
            ChainKind::Solana | ChainKind::Ethereum => {
                let provider = self.registry.lookup(chain)?;
                let accounts = provider
                    .request_accounts()
                    .await
                    .map_err(provider_error)?;
                let address = first_account(accounts, provider.name())?;
                Ok((provider, address))
            }
            ChainKind::Bitcoin => {
                for provider in self.registry.candidates(chain) {
                    match provider.request_accounts().await {
                        Ok(accounts) => match first_account(accounts, provider.name()) {
                            Ok(address) => return Ok((Arc::clone(provider), address)),
                            Err(e) => {
                                warn!(provider = provider.name(), error = %e, "bitcoin provider returned no account");
                            }
                        },
                        Err(e) if e.is_user_rejection() => return Err(BridgeError::UserRejected),
                        Err(e) => {
                            warn!(provider = provider.name(), error = %e, "bitcoin provider failed, trying next");
                        }
                    }
                }
                Err(BridgeError::ProviderNotFound(ChainKind::Bitcoin))
            }
        }
    }

    async fn disconnect(&self) {
        let mut active = self.active.lock().await;
        self.disconnect_locked(&mut active).await;
    }

    /// Disconnect only if `owner` still belongs to the active session.
    async fn disconnect_if_current(&self, owner: &CancellationToken) -> bool {
        let mut active = self.active.lock().await;
        if owner.is_cancelled() {
            return false;
        }
        self.disconnect_locked(&mut active).await;
        true
    }

    async fn disconnect_locked(&self, active: &mut Option<ActiveSession>) {
        if let Some(session) = active.take() {
            session.cancel.cancel();
            if let Some(provider) = session.provider.filter(|p| p.supports_disconnect()) {
                if let Err(e) = provider.disconnect().await {
                    warn!(provider = provider.name(), error = %e, "provider disconnect failed");
                }
            }
        }
        self.replace(WalletState::empty());
        info!("wallet disconnected");
    }

    async fn refresh_balances(&self) {
        let state = self.state_tx.borrow().clone();
        if !state.is_connected {
            return;
        }
        match (state.wallet_type, state.solana_public_key) {
            (Some(ChainKind::Solana), Some(pubkey)) => match self.rpc.get_balance(&pubkey).await {
                Ok(balance) => {
                    self.set_sol_balance(&pubkey, balance);
                }
                Err(e) => warn!(error = %e, "failed to fetch SOL balance"),
            },
            (chain, _) => {
                debug!(chain = ?chain, "balance refresh not supported for chain");
            }
        }
    }

    async fn set_state(self: &Arc<Self>, patch: WalletStatePatch) -> Result<WalletState> {
        let mut active = self.active.lock().await;

        let mut outcome = None;
        self.transition(|s| {
            let next = s.apply(patch);
            if !next.is_consistent() {
                outcome = Some(Err(BridgeError::Validation(
                    "wallet state patch breaks the one-chain invariant".into(),
                )));
                return false;
            }
            let changed = *s != next;
            let prev = std::mem::replace(s, next.clone());
            outcome = Some(Ok((prev, next)));
            changed
        });
        let Some(result) = outcome else {
            return Ok(self.state_tx.borrow().clone());
        };
        let (prev, next) = result?;

        if session_key(&prev) != session_key(&next) {
            let provider = match active.take() {
                Some(old) => {
                    old.cancel.cancel();
                    old.provider.filter(|_| prev.wallet_type == next.wallet_type)
                }
                None => None,
            };
            if let Some(chain) = next.wallet_type.filter(|_| next.is_connected) {
                let provider = provider.or_else(|| self.registry.lookup(chain).ok());
                let cancel = self.shutdown.child_token();
                self.spawn_watchers(&next, provider.as_ref(), &cancel);
                *active = Some(ActiveSession { provider, cancel });
            }
            debug!(chain = ?next.wallet_type, connected = next.is_connected, "session watchers restarted");
        }
        Ok(next)
    }

    /// Update `sol_balance` only if the session is still the same Solana key.
    fn set_sol_balance(&self, pubkey: &str, balance: f64) -> bool {
        self.transition(|s| {
            if s.is_chain(ChainKind::Solana) && s.solana_public_key.as_deref() == Some(pubkey) {
                s.sol_balance = Some(balance);
                true
            } else {
                false
            }
        })
    }

    fn replace(&self, next: WalletState) {
        self.transition(|s| {
            *s = next;
            true
        });
    }

    /// Apply `f` and, if it changed anything, mirror the result into storage
    /// while still holding the channel's write lock.
    fn transition<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut WalletState) -> bool,
    {
        let store = self.store.as_ref();
        let key = self.storage_key.as_str();
        self.state_tx.send_if_modified(|state| {
            if !f(state) {
                return false;
            }
            persist(store, key, state);
            true
        })
    }

    fn spawn_watchers(
        self: &Arc<Self>,
        state: &WalletState,
        provider: Option<&Arc<dyn WalletProvider>>,
        cancel: &CancellationToken,
    ) {
        match state.wallet_type {
            Some(ChainKind::Solana) => {
                if let Some(pubkey) = state.solana_public_key.clone() {
                    tokio::spawn(Arc::clone(self).poll_sol_balance(pubkey, cancel.clone()));
                }
            }
            Some(ChainKind::Ethereum) => {
                if let Some(rx) = provider.and_then(|p| p.account_changes()) {
                    tokio::spawn(Arc::clone(self).watch_accounts(rx, cancel.clone()));
                }
            }
            _ => {}
        }
    }

    /// Fetch the Solana balance now and then every `balance_interval`.
    async fn poll_sol_balance(self: Arc<Self>, pubkey: String, cancel: CancellationToken) {
        debug!(pubkey = %pubkey, interval = ?self.balance_interval, "sol balance polling started");
        let mut ticker = time::interval(self.balance_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(pubkey = %pubkey, "sol balance polling stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        r = self.rpc.get_balance(&pubkey) => r,
                    };
                    match result {
                        Ok(balance) => {
                            self.set_sol_balance(&pubkey, balance);
                        }
                        Err(e) => warn!(error = %e, "failed to fetch SOL balance"),
                    }
                }
            }
        }
    }

    /// Follow the Ethereum provider's account changes for this session.
    async fn watch_accounts(
        self: Arc<Self>,
        mut rx: broadcast::Receiver<Vec<String>>,
        cancel: CancellationToken,
    ) {
        loop {
            let accounts = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                msg = rx.recv() => match msg {
                    Ok(accounts) => accounts,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("account change subscription lagged by {n} messages");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            };

            match accounts.into_iter().next() {
                None => {
                    info!("ethereum provider reported no accounts");
                    if !self.disconnect_if_current(&cancel).await {
                        debug!("account event belonged to an ended session");
                    }
                    return;
                }
                Some(address) => {
                    let changed = self.transition(|s| {
                        if !s.is_chain(ChainKind::Ethereum) || s.address == address {
                            return false;
                        }
                        s.address = address.clone();
                        s.ethereum_address = Some(address.clone());
                        true
                    });
                    if changed {
                        info!(address = %address, "ethereum account changed");
                    }
                }
            }
        }
    }
}

/// What identifies a session for its background tasks.
fn session_key(state: &WalletState) -> (Option<ChainKind>, bool, Option<&str>) {
    (state.wallet_type, state.is_connected, state.identifier())
}

fn provider_error(e: ProviderError) -> BridgeError {
    if e.is_user_rejection() {
        BridgeError::UserRejected
    } else {
        BridgeError::Provider(e)
    }
}

fn first_account(accounts: Vec<String>, provider: &str) -> Result<String> {
    accounts
        .into_iter()
        .next()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            BridgeError::Provider(ProviderError::new(
                None,
                format!("{provider} returned no accounts"),
            ))
        })
}

/// Write the record while connected, remove it otherwise. Storage failures
/// are logged; the in-memory record stays authoritative.
fn persist(store: &dyn KeyValueStore, key: &str, state: &WalletState) {
    let result = if state.is_connected {
        serde_json::to_string(state)
            .map_err(BridgeError::from)
            .and_then(|json| store.set(key, &json))
    } else {
        store.remove(key)
    };
    if let Err(e) = result {
        warn!(error = %e, "failed to persist wallet state");
    }
}

/// Read and validate the persisted record.
pub fn load_persisted(store: &dyn KeyValueStore, key: &str) -> Result<Option<WalletState>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    let state: WalletState = serde_json::from_str(&raw)
        .map_err(|e| BridgeError::MalformedPersistedState(e.to_string()))?;
    if !state.is_consistent() {
        return Err(BridgeError::MalformedPersistedState(
            "identifier fields do not match wallet type".into(),
        ));
    }
    Ok(Some(state))
}
