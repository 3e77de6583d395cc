//! Configuration Module
//!
//! Handles loading and managing cache backend configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use crate::error::{CacheError, Result};

/// Default number of keys buffered before an eviction delete is issued.
pub const DEFAULT_EVICTION_BATCH: usize = 100_000;

// == Backend Kind ==
/// Which storage engine backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded ordered on-disk store
    Embedded,
    /// Networked Redis server
    Redis,
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedded" | "sled" | "badger" => Ok(BackendKind::Embedded),
            "redis" => Ok(BackendKind::Redis),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown cache backend '{}'",
                other
            ))),
        }
    }
}

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend selected by `Backend::open`
    pub backend: BackendKind,
    /// Namespace applied to every key as `"{prefix}:{key}"`
    pub prefix: String,
    /// Directory of the embedded store
    pub embedded_path: PathBuf,
    /// Keys buffered per eviction delete
    pub eviction_batch: usize,
    /// Redis host name
    pub redis_host: String,
    /// Redis port
    pub redis_port: u16,
    /// Redis AUTH password
    pub redis_password: Option<String>,
    /// Redis logical database index
    pub redis_db: i64,
    /// Maximum pooled Redis connections
    pub redis_pool_size: u32,
    /// Seconds an idle pooled connection is kept
    pub redis_idle_timeout: u64,
    /// Seconds to wait for a pooled connection
    pub redis_connect_timeout: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `embedded` or `redis` (default: embedded)
    /// - `CACHE_PREFIX` - Key namespace (default: app)
    /// - `CACHE_DIR` - Embedded store directory (default: ./storage/cache)
    /// - `CACHE_EVICTION_BATCH` - Keys per eviction delete (default: 100000)
    /// - `REDIS_HOST` / `REDIS_PORT` / `REDIS_PASSWORD` / `REDIS_DB`
    /// - `REDIS_POOL_SIZE` (default: 50)
    /// - `REDIS_IDLE_TIMEOUT` - Seconds (default: 240)
    /// - `REDIS_CONNECT_TIMEOUT` - Seconds (default: 5)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable source. Unparseable values
    /// fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            backend: lookup("CACHE_BACKEND")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.backend),
            prefix: lookup("CACHE_PREFIX").unwrap_or(defaults.prefix),
            embedded_path: lookup("CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.embedded_path),
            eviction_batch: parse_var(&lookup, "CACHE_EVICTION_BATCH")
                .unwrap_or(defaults.eviction_batch),
            redis_host: lookup("REDIS_HOST").unwrap_or(defaults.redis_host),
            redis_port: parse_var(&lookup, "REDIS_PORT").unwrap_or(defaults.redis_port),
            redis_password: lookup("REDIS_PASSWORD").filter(|p| !p.is_empty()),
            redis_db: parse_var(&lookup, "REDIS_DB").unwrap_or(defaults.redis_db),
            redis_pool_size: parse_var(&lookup, "REDIS_POOL_SIZE")
                .unwrap_or(defaults.redis_pool_size),
            redis_idle_timeout: parse_var(&lookup, "REDIS_IDLE_TIMEOUT")
                .unwrap_or(defaults.redis_idle_timeout),
            redis_connect_timeout: parse_var(&lookup, "REDIS_CONNECT_TIMEOUT")
                .unwrap_or(defaults.redis_connect_timeout),
        }
    }

    /// Rejects settings no backend can work with.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(CacheError::InvalidConfig(
                "cache prefix must not be empty".to_string(),
            ));
        }
        if self.redis_pool_size == 0 {
            return Err(CacheError::InvalidConfig(
                "redis pool size must be at least 1".to_string(),
            ));
        }
        // The pool builder asserts both timeouts are positive
        if self.redis_connect_timeout == 0 {
            return Err(CacheError::InvalidConfig(
                "redis connect timeout must be at least 1 second".to_string(),
            ));
        }
        if self.redis_idle_timeout == 0 {
            return Err(CacheError::InvalidConfig(
                "redis idle timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    /// Connection details for the configured Redis server.
    ///
    /// Built field by field so passwords containing URL delimiters
    /// (`#`, `/`, `?`, `@`) reach the server unchanged.
    pub fn redis_connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.redis_host.clone(), self.redis_port),
            redis: RedisConnectionInfo {
                db: self.redis_db,
                password: self.redis_password.clone(),
                ..RedisConnectionInfo::default()
            },
        }
    }

    pub fn redis_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.redis_idle_timeout)
    }

    pub fn redis_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.redis_connect_timeout)
    }
}

/// Reads and parses one variable; missing or unparseable values yield None.
fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Embedded,
            prefix: "app".to_string(),
            embedded_path: PathBuf::from("./storage/cache"),
            eviction_batch: DEFAULT_EVICTION_BATCH,
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_password: None,
            redis_db: 0,
            redis_pool_size: 50,
            redis_idle_timeout: 240,
            redis_connect_timeout: 5,
        }
    }
}
