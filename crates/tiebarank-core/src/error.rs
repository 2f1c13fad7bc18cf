use thiserror::Error;

#[derive(Debug, Error)]
pub enum RankError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid request token")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RankError {
    /// Short error code string for the API layer's error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            RankError::Config(_) => "CONFIG_ERROR",
            RankError::Network(_) => "NETWORK_ERROR",
            RankError::Http { .. } => "HTTP_ERROR",
            RankError::Parse(_) => "PARSE_ERROR",
            RankError::Cache(_) => "CACHE_ERROR",
            RankError::Database(_) => "DATABASE_ERROR",
            RankError::Unauthorized => "INVALID_REQUEST",
            RankError::BadRequest(_) => "BAD_REQUEST",
            RankError::NotFound(_) => "NOT_FOUND",
            RankError::Timeout { .. } => "TIMEOUT",
            RankError::Serialization(_) => "SERIALIZATION_ERROR",
            RankError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may reasonably try the same request again.
    pub fn is_transient(&self) -> bool {
        matches!(self, RankError::Network(_) | RankError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, RankError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_transience() {
        assert_eq!(RankError::Unauthorized.code(), "INVALID_REQUEST");
        assert_eq!(RankError::Timeout { ms: 5 }.code(), "TIMEOUT");
        assert!(RankError::Network("reset".into()).is_transient());
        assert!(!RankError::Parse("markup".into()).is_transient());
    }
}
