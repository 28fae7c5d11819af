//! Error types for database lookups

use thiserror::Error;

pub type ExplorerResult<T> = Result<T, ExplorerError>;

/// Every variant is recoverable: the caller falls back to the engine.
#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("Opening database rate limit reached")]
    RateLimited,

    #[error("Opening database unavailable: {0}")]
    Unavailable(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Opening database returned invalid data: {0}")]
    InvalidData(String),

    #[error("Mock response not configured for: {0}")]
    NotConfigured(String),
}

impl ExplorerError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}
