//! Error taxonomy for the persistence coordination core.
//!
//! Read operations stay silent-and-safe, mutation on required
//! identifiers is noisy, everything else degrades gracefully.

/// Error type shared by every core component.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required identifier was null/blank/otherwise unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The family's mode is "off" — no backend is wired up for it.
    #[error("family not configured: {0:?}")]
    NotConfigured(crate::config::Family),

    /// The cache/store infrastructure named in config could not be resolved.
    #[error("backend absent: {0}")]
    BackendAbsent(String),

    /// Timeout or connection loss talking to a backend.
    #[error("backend transient error: {0}")]
    BackendTransient(String),

    /// Store-tier failure surfaced verbatim from sqlx.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Cache-tier failure surfaced verbatim from redis.
    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// Serialization/deserialization of a cached value failed.
    #[error("cache (de)serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::BackendTransient("deadline exceeded".into())
    }
}
