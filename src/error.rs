use thiserror::Error;
use zecbridge::{BridgeError, SubmitBlocked};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("bridge not started: {0}")]
    Blocked(#[from] SubmitBlocked),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
