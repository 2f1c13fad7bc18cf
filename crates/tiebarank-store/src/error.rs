use thiserror::Error;
use tiebarank_core::RankError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("cannot prepare database location: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for RankError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => RankError::NotFound(what),
            other => RankError::Database(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
