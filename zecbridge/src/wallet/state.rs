use serde::{Deserialize, Serialize};

use crate::types::ChainKind;

/// The client's single wallet session record.
///
/// Serialized with the same camelCase layout that is persisted under the
/// `walletState` key; `type` is `null` while disconnected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    #[serde(rename = "type")]
    pub wallet_type: Option<ChainKind>,
    pub address: String,
    pub is_connected: bool,
    pub solana_public_key: Option<String>,
    pub ethereum_address: Option<String>,
    pub bitcoin_address: Option<String>,
    pub sol_balance: Option<f64>,
    pub eth_balance: Option<f64>,
    pub btc_balance: Option<f64>,
}

impl WalletState {
    /// The disconnected record.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A freshly connected record: only the identifier for `chain` is set and
    /// no balance has been fetched yet.
    pub fn connected(chain: ChainKind, address: impl Into<String>) -> Self {
        let address = address.into();
        let mut state = Self {
            wallet_type: Some(chain),
            address: address.clone(),
            is_connected: true,
            ..Default::default()
        };
        match chain {
            ChainKind::Solana => state.solana_public_key = Some(address),
            ChainKind::Ethereum => state.ethereum_address = Some(address),
            ChainKind::Bitcoin => state.bitcoin_address = Some(address),
        }
        state
    }

    /// The chain-specific identifier matching `wallet_type`, if any.
    pub fn identifier(&self) -> Option<&str> {
        match self.wallet_type? {
            ChainKind::Solana => self.solana_public_key.as_deref(),
            ChainKind::Ethereum => self.ethereum_address.as_deref(),
            ChainKind::Bitcoin => self.bitcoin_address.as_deref(),
        }
    }

    pub fn is_chain(&self, chain: ChainKind) -> bool {
        self.is_connected && self.wallet_type == Some(chain)
    }

    /// Either fully disconnected, or connected to exactly one chain whose
    /// identifier is the only one set.
    pub fn is_consistent(&self) -> bool {
        let ids = [
            (ChainKind::Solana, self.solana_public_key.is_some()),
            (ChainKind::Ethereum, self.ethereum_address.is_some()),
            (ChainKind::Bitcoin, self.bitcoin_address.is_some()),
        ];
        match self.wallet_type {
            None => !self.is_connected && ids.iter().all(|(_, set)| !set),
            Some(chain) => {
                self.is_connected
                    && ids
                        .iter()
                        .all(|(kind, set)| *set == (*kind == chain))
            }
        }
    }

    /// Merge a partial update, returning the new record.
    pub fn apply(&self, patch: WalletStatePatch) -> Self {
        let mut next = self.clone();
        if let Some(v) = patch.wallet_type {
            next.wallet_type = v;
        }
        if let Some(v) = patch.address {
            next.address = v;
        }
        if let Some(v) = patch.is_connected {
            next.is_connected = v;
        }
        if let Some(v) = patch.solana_public_key {
            next.solana_public_key = v;
        }
        if let Some(v) = patch.ethereum_address {
            next.ethereum_address = v;
        }
        if let Some(v) = patch.bitcoin_address {
            next.bitcoin_address = v;
        }
        if let Some(v) = patch.sol_balance {
            next.sol_balance = v;
        }
        if let Some(v) = patch.eth_balance {
            next.eth_balance = v;
        }
        if let Some(v) = patch.btc_balance {
            next.btc_balance = v;
        }
        next
    }
}

/// Partial update for [`WalletState`]. `None` leaves a field untouched;
/// `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct WalletStatePatch {
    pub wallet_type: Option<Option<ChainKind>>,
    pub address: Option<String>,
    pub is_connected: Option<bool>,
    pub solana_public_key: Option<Option<String>>,
    pub ethereum_address: Option<Option<String>>,
    pub bitcoin_address: Option<Option<String>>,
    pub sol_balance: Option<Option<f64>>,
    pub eth_balance: Option<Option<f64>>,
    pub btc_balance: Option<Option<f64>>,
}
