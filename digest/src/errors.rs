use store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("no snapshot is open, call open_snapshot first")]
    ProviderNotOpened,

    #[error("a snapshot is already open: {0}")]
    ProviderAlreadyOpen(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("task error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Custom(String),
}

impl DigestError {
    pub fn custom(msg: impl Into<String>) -> Self {
        DigestError::Custom(msg.into())
    }
}
