//! Stored Record Module
//!
//! Layout of a value in the embedded store: an 8-byte big-endian expiry
//! timestamp (Unix milliseconds, 0 = never) followed by the codec payload.

use chrono::Utc;

use crate::error::{CacheError, Result};

const HEADER_LEN: usize = 8;

// == Stored Record ==
/// A codec payload plus its expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
    /// Encoded entry
    pub payload: Vec<u8>,
}

impl StoredRecord {
    // == Constructor ==
    /// Creates a record with optional TTL. A TTL of zero means no expiration.
    ///
    /// # Arguments
    /// * `payload` - The encoded entry
    /// * `ttl_seconds` - Optional TTL in seconds
    pub fn new(payload: Vec<u8>, ttl_seconds: Option<u64>) -> Self {
        let expires_at = ttl_seconds
            .filter(|ttl| *ttl > 0)
            .map(|ttl| current_timestamp_ms().saturating_add(ttl.saturating_mul(1000)));

        Self {
            expires_at,
            payload,
        }
    }

    // == Serialization ==
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(&self.expires_at.unwrap_or(0).to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let expires_at = read_expiry(bytes)?;
        Ok(Self {
            expires_at,
            payload: bytes[HEADER_LEN..].to_vec(),
        })
    }

    // == Is Expired ==
    /// Checks if the record has expired.
    ///
    /// A record is expired once the current time is greater than or equal to
    /// its expiration time.
    pub fn is_expired(&self) -> bool {
        expired_at(self.expires_at, current_timestamp_ms())
    }

    // == Time To Live ==
    /// Returns remaining TTL in seconds, or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(current_timestamp_ms()) / 1000)
    }
}

/// Reads only the expiry header, without copying the payload.
pub fn read_expiry(bytes: &[u8]) -> Result<Option<u64>> {
    let header: [u8; HEADER_LEN] = bytes
        .get(..HEADER_LEN)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| {
            CacheError::CorruptPayload(format!(
                "record of {} bytes is shorter than its header",
                bytes.len()
            ))
        })?;

    match u64::from_be_bytes(header) {
        0 => Ok(None),
        ts => Ok(Some(ts)),
    }
}

/// Whether a record with the given expiry is dead at `now_ms`.
pub fn expired_at(expires_at: Option<u64>, now_ms: u64) -> bool {
    match expires_at {
        Some(expires) => now_ms >= expires,
        None => false,
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
