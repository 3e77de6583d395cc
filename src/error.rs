//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for every cache backend.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent or expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Stored bytes do not decode into an entry of the requested shape
    #[error("Corrupt payload: {0}")]
    CorruptPayload(String),

    /// Storage engine, transport or pool failure
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Value could not be serialized for storage
    #[error("Encode error: {0}")]
    Encode(String),

    /// Configuration rejected when opening a backend
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl CacheError {
    /// True for the error kinds that mean "the cache has nothing usable here".
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

// == Backend Conversions ==
impl From<sled::Error> for CacheError {
    fn from(err: sled::Error) -> Self {
        CacheError::BackendUnavailable(format!("embedded store: {}", err))
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::BackendUnavailable(format!("redis: {}", err))
    }
}

impl From<r2d2::Error> for CacheError {
    fn from(err: r2d2::Error) -> Self {
        CacheError::BackendUnavailable(format!("redis pool: {}", err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;
