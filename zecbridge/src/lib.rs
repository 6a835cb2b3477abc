pub mod bridge;
pub mod config;
pub mod error;
pub mod prices;
pub mod rest;
pub mod solana;
pub mod types;
pub mod wallet;

// ---- Top-level re-exports for ergonomic usage ----

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};

// Shared enums
pub use types::{Asset, ChainKind, Direction, Token};

// REST client
pub use rest::HttpClient;

// Prices
pub use prices::{PriceClient, PriceFeed, TokenPrices};

// Solana RPC
pub use solana::SolanaRpc;

// Wallet session
pub use wallet::provider::{
    ProviderError, ProviderRegistry, WalletProvider, WatchOnlyProvider, USER_REJECTED_CODE,
};
pub use wallet::session::WalletSession;
pub use wallet::state::{WalletState, WalletStatePatch};
pub use wallet::storage::{FileStore, KeyValueStore, MemoryStore};
pub use wallet::widget::ConnectWidget;

// Bridge form
pub use bridge::form::{BridgeForm, CallToAction, FormState, SubmitBlocked};
pub use bridge::script::{Stage, BRIDGE_SCRIPT};
