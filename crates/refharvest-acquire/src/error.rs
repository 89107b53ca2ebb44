use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("invalid DOI: {0}")]
    InvalidDoi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("no mirror available for {0}")]
    NoMirror(String),

    #[error("invalid proxy {0}: {1}")]
    InvalidProxy(String, String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] refharvest_core::CoreError),
}

pub type Result<T> = std::result::Result<T, AcquireError>;
