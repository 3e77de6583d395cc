//! Redis Cache Backend
//!
//! Cache contract over a Redis server. Keys are namespaced as
//! `"{prefix}:{key}"`, expiry is applied with `SET .. EX`, and prefix eviction
//! walks a cursor-based `SCAN MATCH` feeding batched multi-key `DEL`s.

use r2d2::{Pool, PooledConnection};
use redis::ConnectionLike;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::entry::{decode_value, encode_value};
use crate::cache::eviction::{EvictionBatch, EvictionSummary};
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::cache::{namespaced, Cache};
use crate::config::Config;
use crate::error::{CacheError, Result};

/// `COUNT` hint passed to each `SCAN` call.
const SCAN_COUNT: usize = 1000;

// == Redis Cache ==
/// Cache backend over a pooled Redis connection.
pub struct RedisCache {
    /// Connection pool; each operation checks out one connection
    pool: Pool<redis::Client>,
    /// Namespace applied to every key
    prefix: String,
    /// Keys per multi-key `DEL`
    eviction_batch: usize,
    /// Operation counters
    stats: StatsRecorder,
}

impl RedisCache {
    // == Constructor ==
    /// Connects to the configured server and builds the pool.
    ///
    /// Fails with `BackendUnavailable` if no connection can be established
    /// within the configured connect timeout.
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;

        let client = redis::Client::open(config.redis_connection_info())?;
        let pool = Pool::builder()
            .max_size(config.redis_pool_size)
            .min_idle(Some(1))
            .idle_timeout(Some(config.redis_idle_timeout()))
            .connection_timeout(config.redis_connect_timeout())
            .build(client)
            .map_err(|e| {
                error!(
                    "Failed to connect to redis at {}:{}: {}",
                    config.redis_host, config.redis_port, e
                );
                CacheError::from(e)
            })?;

        info!(
            "Redis cache connected to {}:{} (prefix={}, pool_size={})",
            config.redis_host, config.redis_port, config.prefix, config.redis_pool_size
        );

        Ok(Self::with_pool(pool, &config.prefix, config.eviction_batch))
    }

    /// Wraps an existing pool.
    pub fn with_pool(pool: Pool<redis::Client>, prefix: &str, eviction_batch: usize) -> Self {
        Self {
            pool,
            prefix: prefix.to_string(),
            eviction_batch,
            stats: StatsRecorder::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, key: &str) -> String {
        namespaced(&self.prefix, key)
    }

    fn conn(&self) -> Result<PooledConnection<redis::Client>> {
        Ok(self.pool.get()?)
    }

    /// Collect-then-delete over every key matching `pattern`.
    ///
    /// The connection goes back to the pool when this returns, on every path.
    fn evict_pattern(&self, pattern: &str) -> Result<EvictionSummary> {
        let mut conn = self.conn()?;
        scan_and_delete(&mut *conn, pattern, self.eviction_batch)
    }

    /// Releases every pooled connection.
    pub fn close(self) {
        info!("Redis cache closed (prefix={})", self.prefix);
    }
}

// == Eviction ==
/// Walks `SCAN MATCH pattern` to completion, deleting matches with one
/// multi-key `DEL` per `capacity` keys.
///
/// DELs are interleaved with SCAN pages; the cursor is stateless on the
/// server so removing already-returned keys does not disturb the walk.
fn scan_and_delete(
    conn: &mut dyn ConnectionLike,
    pattern: &str,
    capacity: usize,
) -> Result<EvictionSummary> {
    let mut batch: EvictionBatch<String> = EvictionBatch::new(capacity);
    let mut cursor: u64 = 0;

    loop {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query(&mut *conn)?;

        for key in keys {
            batch.push(key, |pending| delete_keys(&mut *conn, pending))?;
        }

        if next == 0 {
            break;
        }
        cursor = next;
    }

    batch.finish(|pending| delete_keys(&mut *conn, pending))
}

/// One multi-key `DEL` for a whole batch.
fn delete_keys(conn: &mut dyn ConnectionLike, keys: &[String]) -> Result<()> {
    redis::cmd("DEL").arg(keys).query::<()>(conn)?;
    Ok(())
}

// == Pattern Helpers ==
/// Escapes glob metacharacters so `raw` matches only itself in `SCAN MATCH`.
pub(crate) fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// `SCAN MATCH` pattern selecting every namespaced key starting with `prefix`.
pub(crate) fn match_pattern(namespace: &str, prefix: &str) -> String {
    format!("{}*", escape_glob(&namespaced(namespace, prefix)))
}

impl Cache for RedisCache {
    fn has(&self, key: &str) -> Result<bool> {
        let result = self.conn().and_then(|mut conn| {
            redis::cmd("EXISTS")
                .arg(self.key(key))
                .query::<bool>(&mut *conn)
                .map_err(CacheError::from)
        });

        match result {
            Ok(true) => {
                self.stats.record_hit();
                Ok(true)
            }
            Ok(false) => {
                self.stats.record_miss();
                Ok(false)
            }
            Err(err) => {
                warn!("has({}) treated as absent: {}", key, err);
                self.stats.record_miss();
                Ok(false)
            }
        }
    }

    fn get<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let result = self.conn().and_then(|mut conn| {
            let bytes: Option<Vec<u8>> = redis::cmd("GET").arg(self.key(key)).query(&mut *conn)?;
            let bytes = bytes.ok_or_else(|| CacheError::NotFound(key.to_string()))?;
            decode_value(key, &bytes)
        });

        match &result {
            Ok(_) => self.stats.record_hit(),
            Err(_) => self.stats.record_miss(),
        }
        result
    }

    fn set<T>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let payload = encode_value(key, value)?;
        let mut conn = self.conn()?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(self.key(key)).arg(payload);
        if let Some(ttl) = ttl_seconds.filter(|ttl| *ttl > 0) {
            cmd.arg("EX").arg(ttl);
        }
        cmd.query::<()>(&mut *conn)?;

        self.stats.record_write();
        debug!("set {} (ttl={:?})", key, ttl_seconds);
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let removed: u64 = redis::cmd("DEL").arg(self.key(key)).query(&mut *conn)?;
        self.stats.record_removals(removed);
        Ok(())
    }

    fn empty_by_match(&self, prefix: &str) -> Result<()> {
        let pattern = match_pattern(&self.prefix, prefix);
        let summary = self.evict_pattern(&pattern)?;

        self.stats.record_eviction(summary);
        debug!(
            "empty_by_match({}) removed {} keys in {} batches",
            prefix, summary.keys_removed, summary.batches
        );
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}
