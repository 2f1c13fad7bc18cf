use thiserror::Error;
use tiebarank_core::RankError;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// Connection refused, reset, or timed out. Retry is the caller's call.
    #[error("network error: {0}")]
    Network(String),

    /// Non-200 status for a page. Never retried here.
    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    /// Markup changed or a field is missing. The whole page is rejected.
    #[error("parse error: {0}")]
    Parse(String),

    /// Profile page has no avatar block; the member is gone or hidden.
    #[error("member not found: {0}")]
    MemberNotFound(String),

    #[error("resolve timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("no boundary found after {rounds} rounds")]
    Exhausted { rounds: u32 },

    #[error("crawl task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for CrawlError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => CrawlError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            },
            None if e.is_decode() => CrawlError::Parse(e.to_string()),
            None => CrawlError::Network(e.to_string()),
        }
    }
}

impl From<CrawlError> for RankError {
    fn from(e: CrawlError) -> Self {
        match e {
            CrawlError::Network(msg) => RankError::Network(msg),
            CrawlError::Http { status, message } => RankError::Http { status, message },
            CrawlError::Parse(msg) => RankError::Parse(msg),
            CrawlError::MemberNotFound(link) => RankError::NotFound(link),
            CrawlError::Timeout { ms } => RankError::Timeout { ms },
            e @ CrawlError::Exhausted { .. } => RankError::NotFound(e.to_string()),
            CrawlError::Task(msg) => RankError::Internal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
