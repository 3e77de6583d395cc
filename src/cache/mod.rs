//! Cache Module
//!
//! One cache contract implemented over an embedded ordered store and a Redis
//! server. Callers depend on [`Cache`]; [`Backend`] picks an implementation
//! from configuration at runtime.

mod embedded;
mod entry;
mod eviction;
mod networked;
mod record;
mod stats;


use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{BackendKind, Config};
use crate::error::Result;

// Re-export public types
pub use embedded::EmbeddedCache;
pub use entry::{decode, decode_value, encode, encode_value, Entry};
pub use eviction::{EvictionBatch, EvictionSummary};
pub use networked::RedisCache;
pub use record::StoredRecord;
pub use stats::{CacheStats, StatsRecorder};

// == Public Constants ==
/// Separator between a cache's namespace and the caller's key.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Applies a cache namespace to a caller key: `"{prefix}:{key}"`.
pub fn namespaced(prefix: &str, key: &str) -> String {
    format!("{}{}{}", prefix, NAMESPACE_SEPARATOR, key)
}

// == Cache Contract ==
/// Operations every cache backend provides identically.
///
/// Keys are caller keys; each backend applies its own namespace. A TTL of
/// `None` or `Some(0)` means the entry never expires.
pub trait Cache {
    /// True iff a live entry exists for `key`.
    ///
    /// Any failure to read the entry, including corrupt payloads and backend
    /// errors, is reported as `false` rather than as an error.
    fn has(&self, key: &str) -> Result<bool> {
        match self.get::<serde_json::Value>(key) {
            Ok(_) => Ok(true),
            Err(err) => {
                debug!("has({}) treated as absent: {}", key, err);
                Ok(false)
            }
        }
    }

    /// Returns the decoded value for `key`.
    fn get<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned;

    /// Stores `value` under `key`, atomically replacing any previous entry.
    fn set<T>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<()>
    where
        T: Serialize + ?Sized;

    /// Deletes the entry for `key`. Absent keys are not an error.
    fn forget(&self, key: &str) -> Result<()>;

    /// Deletes every key starting with `prefix`, in bounded batches.
    fn empty_by_match(&self, prefix: &str) -> Result<()>;

    /// Deletes every key in this cache's namespace.
    fn empty(&self) -> Result<()> {
        self.empty_by_match("")
    }

    /// Snapshot of this backend's counters.
    fn stats(&self) -> CacheStats;
}

// == Backend ==
/// A cache backend chosen at runtime.
pub enum Backend {
    Embedded(EmbeddedCache),
    Redis(RedisCache),
}

impl Backend {
    /// Opens the backend named by `config.backend`.
    pub fn open(config: &Config) -> Result<Self> {
        let backend = match config.backend {
            BackendKind::Embedded => Backend::Embedded(EmbeddedCache::open(config)?),
            BackendKind::Redis => Backend::Redis(RedisCache::open(config)?),
        };
        info!("Cache backend ready: {:?}", config.backend);
        Ok(backend)
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Embedded(_) => BackendKind::Embedded,
            Backend::Redis(_) => BackendKind::Redis,
        }
    }

    /// Releases the backend, flushing the embedded store to disk.
    pub fn close(self) -> Result<()> {
        match self {
            Backend::Embedded(cache) => cache.close(),
            Backend::Redis(cache) => {
                cache.close();
                Ok(())
            }
        }
    }
}

impl Cache for Backend {
    fn has(&self, key: &str) -> Result<bool> {
        match self {
            Backend::Embedded(cache) => cache.has(key),
            Backend::Redis(cache) => cache.has(key),
        }
    }

    fn get<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        match self {
            Backend::Embedded(cache) => cache.get(key),
            Backend::Redis(cache) => cache.get(key),
        }
    }

    fn set<T>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        match self {
            Backend::Embedded(cache) => cache.set(key, value, ttl_seconds),
            Backend::Redis(cache) => cache.set(key, value, ttl_seconds),
        }
    }

    fn forget(&self, key: &str) -> Result<()> {
        match self {
            Backend::Embedded(cache) => cache.forget(key),
            Backend::Redis(cache) => cache.forget(key),
        }
    }

    fn empty_by_match(&self, prefix: &str) -> Result<()> {
        match self {
            Backend::Embedded(cache) => cache.empty_by_match(prefix),
            Backend::Redis(cache) => cache.empty_by_match(prefix),
        }
    }

    fn empty(&self) -> Result<()> {
        match self {
            Backend::Embedded(cache) => cache.empty(),
            Backend::Redis(cache) => cache.empty(),
        }
    }

    fn stats(&self) -> CacheStats {
        match self {
            Backend::Embedded(cache) => cache.stats(),
            Backend::Redis(cache) => cache.stats(),
        }
    }
}
