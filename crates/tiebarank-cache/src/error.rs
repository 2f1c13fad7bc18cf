use thiserror::Error;
use tiebarank_core::RankError;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store could not be read or written.
    #[error("cache store error: {0}")]
    Store(String),

    /// A stored entry does not decode as the requested type.
    #[error("cache entry corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CacheError> for RankError {
    fn from(e: CacheError) -> Self {
        RankError::Cache(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
