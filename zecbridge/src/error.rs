use thiserror::Error;

use crate::types::ChainKind;
use crate::wallet::provider::ProviderError;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("{0} wallet not found")]
    ProviderNotFound(ChainKind),

    #[error("user rejected the connection request")]
    UserRejected,

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("price fetch failed with HTTP {status}: {message}")]
    PriceFetch { status: u16, message: String },

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed persisted state: {0}")]
    MalformedPersistedState(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl BridgeError {
    /// Whether the error came from the user declining a wallet prompt.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, BridgeError::UserRejected)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
