//! Connect-button state: in-flight flag, short-lived error message and the
//! labels shown for the current session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::types::ChainKind;
use crate::wallet::session::WalletSession;
use crate::wallet::state::WalletState;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetState {
    pub is_connecting: bool,
    /// Last connect error; cleared automatically after the display window.
    pub error: Option<String>,
}

pub struct ConnectWidget {
    session: Arc<WalletSession>,
    error_display: Duration,
    state_tx: watch::Sender<WidgetState>,
    clear_timer: Mutex<Option<CancellationToken>>,
}

impl ConnectWidget {
    pub fn new(session: Arc<WalletSession>, error_display: Duration) -> Self {
        let (state_tx, _) = watch::channel(WidgetState::default());
        Self {
            session,
            error_display,
            state_tx,
            clear_timer: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WidgetState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WidgetState> {
        self.state_tx.subscribe()
    }

    /// Connect through the session, surfacing any failure as a message that
    /// disappears after the display window. The error is also returned.
    pub async fn handle_connect(&self, chain: ChainKind) -> Result<WalletState> {
        self.state_tx.send_modify(|s| {
            s.is_connecting = true;
            s.error = None;
        });

        let result = self.session.connect(chain).await;

        let message = result.as_ref().err().map(|e| connect_error_message(chain, e));
        self.state_tx.send_modify(|s| {
            s.is_connecting = false;
            s.error = message.clone();
        });
        if message.is_some() {
            self.schedule_clear().await;
        }
        result
    }

    pub async fn handle_disconnect(&self) {
        self.session.disconnect().await;
    }

    /// Button caption for the current session.
    pub fn label(&self) -> String {
        let state = self.session.state();
        if self.state_tx.borrow().is_connecting {
            return "Connecting...".into();
        }
        match state.wallet_type.filter(|_| state.is_connected) {
            Some(chain) => format!("{} {}", chain.display_name(), short_address(&state.address)),
            None => "Connect Wallet".into(),
        }
    }

    async fn schedule_clear(&self) {
        let mut timer = self.clear_timer.lock().await;
        if let Some(prev) = timer.take() {
            prev.cancel();
        }
        let cancel = CancellationToken::new();
        let tx = self.state_tx.clone();
        let delay = self.error_display;
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    debug!("clearing connect error");
                    tx.send_modify(|s| s.error = None);
                }
                _ = token.cancelled() => {}
            }
        });
        *timer = Some(cancel);
    }
}

impl Drop for ConnectWidget {
    fn drop(&mut self) {
        if let Ok(mut timer) = self.clear_timer.try_lock() {
            if let Some(t) = timer.take() {
                t.cancel();
            }
        }
    }
}

/// User-facing text for a failed connect.
pub fn connect_error_message(chain: ChainKind, err: &BridgeError) -> String {
    match err {
        BridgeError::ProviderNotFound(_) => {
            let hint = match chain {
                ChainKind::Solana => "Please install Phantom or another Solana wallet.",
                ChainKind::Ethereum => "Please install MetaMask or another Ethereum wallet.",
                ChainKind::Bitcoin => "Please install Unisat or Xverse wallet.",
            };
            format!("{} wallet not found. {hint}", chain.display_name())
        }
        BridgeError::UserRejected => "User rejected the connection request".into(),
        BridgeError::Provider(e) if !e.message.is_empty() => e.message.clone(),
        _ => "Failed to connect wallet".into(),
    }
}

/// `abcd...wxyz` form of an address; short inputs come back unchanged.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 8 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
