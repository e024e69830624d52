use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Part of the storage contract for backends without buffered
    /// transactions; neither bundled backend returns it.
    #[error("storage does not support batches")]
    NotBatchStorage,

    #[error("failed to decode value: {0}")]
    DecodeValueFailed(String),

    #[error("no collection registered for key prefix: {0}")]
    UnknownNamespace(String),

    #[error("key schema mismatch: stored version {stored}, expected {expected}")]
    SchemaMismatch { stored: u8, expected: u8 },

    #[error("batch is already written or cancelled")]
    BatchClosed,

    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hook {hook} failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub fn not_found(key: &[u8]) -> Self {
        StoreError::NotFound(hex::encode(key))
    }

    pub fn already_exists(key: &[u8]) -> Self {
        StoreError::AlreadyExists(hex::encode(key))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}
