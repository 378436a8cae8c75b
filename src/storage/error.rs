use thiserror::Error;

use crate::domain::id::InvalidDocumentId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot connect to document store: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("malformed document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidDocumentId(#[from] InvalidDocumentId),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
