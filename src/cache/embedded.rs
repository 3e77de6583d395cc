//! Embedded Cache Backend
//!
//! Cache contract over `sled`, an ordered, transactional on-disk store.
//! Every key is stored as `"{prefix}:{key}"`; values carry an expiry header
//! (see [`StoredRecord`]) that each read checks, so an expired entry is never
//! returned even before it is purged.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use tracing::{debug, error, info};

use crate::cache::entry::{decode_value, encode_value};
use crate::cache::eviction::{EvictionBatch, EvictionSummary};
use crate::cache::record::{current_timestamp_ms, expired_at, read_expiry, StoredRecord};
use crate::cache::stats::{CacheStats, StatsRecorder};
use crate::cache::{namespaced, Cache};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Embedded Cache ==
/// Cache backend over an embedded sled database.
#[derive(Debug)]
pub struct EmbeddedCache {
    /// Open database handle
    db: sled::Db,
    /// Namespace applied to every key
    prefix: String,
    /// Keys per eviction delete transaction
    eviction_batch: usize,
    /// Operation counters
    stats: StatsRecorder,
}

impl EmbeddedCache {
    // == Constructor ==
    /// Opens (or creates) the database at `config.embedded_path`.
    ///
    /// Failing to open, for example because another process holds the
    /// directory lock, leaves no usable backend and returns
    /// `BackendUnavailable`. Nothing is retried.
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;

        let db = sled::Config::new()
            .path(&config.embedded_path)
            .open()
            .map_err(|e| {
                error!(
                    "Failed to open embedded cache at {}: {}",
                    config.embedded_path.display(),
                    e
                );
                CacheError::from(e)
            })?;

        info!(
            "Embedded cache opened at {} (prefix={}, eviction_batch={})",
            config.embedded_path.display(),
            config.prefix,
            config.eviction_batch
        );

        Ok(Self::with_db(db, &config.prefix, config.eviction_batch))
    }

    /// Wraps an already opened database.
    pub fn with_db(db: sled::Db, prefix: &str, eviction_batch: usize) -> Self {
        Self {
            db,
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

    // == Read ==
    /// Reads the live record for `key`. Expired records are `NotFound`.
    fn read_record(&self, key: &str) -> Result<StoredRecord> {
        let bytes = self
            .db
            .get(self.key(key).as_bytes())?
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;

        // Copied out of the engine's buffer here
        let record = StoredRecord::from_bytes(&bytes)?;
        if record.is_expired() {
            return Err(CacheError::NotFound(key.to_string()));
        }
        Ok(record)
    }

    // == Batched Delete ==
    /// Removes every key in `keys` as one atomic batch.
    fn delete_batch(&self, keys: &[Vec<u8>]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for key in keys {
            batch.remove(key.as_slice());
        }
        self.db.apply_batch(batch)?;
        Ok(())
    }

    /// Removes the keys in `keys` that are still expired at commit time.
    ///
    /// Returns how many were removed. A key refreshed by a concurrent Set
    /// since the scan saw it is left alone.
    fn delete_expired_batch(&self, keys: &[Vec<u8>], now_ms: u64) -> Result<usize> {
        let result = self.db.transaction(|tx| {
            let mut removed = 0usize;
            for key in keys {
                if let Some(bytes) = tx.get(key.as_slice())? {
                    let expired = match read_expiry(&bytes) {
                        Ok(expires_at) => expired_at(expires_at, now_ms),
                        Err(_) => false,
                    };
                    if expired {
                        tx.remove(key.as_slice())?;
                        removed += 1;
                    }
                }
            }
            Ok::<_, ConflictableTransactionError<()>>(removed)
        });

        result.map_err(|e| match e {
            TransactionError::Storage(err) => CacheError::from(err),
            TransactionError::Abort(()) => {
                CacheError::BackendUnavailable("purge transaction aborted".to_string())
            }
        })
    }

    /// Collect-then-delete over every stored key starting with `scan_prefix`.
    fn evict_prefix(&self, scan_prefix: &[u8]) -> Result<EvictionSummary> {
        let mut batch: EvictionBatch<Vec<u8>> = EvictionBatch::new(self.eviction_batch);

        for key in self.db.scan_prefix(scan_prefix).keys() {
            let key = key?;
            batch.push(key.to_vec(), |keys| self.delete_batch(keys))?;
        }

        batch.finish(|keys| self.delete_batch(keys))
    }

    // == Purge Expired ==
    /// Removes every expired record in this cache's namespace.
    ///
    /// Reads never return expired records, so this only reclaims space. The
    /// cache never runs it on its own; hosts call it on their own schedule.
    ///
    /// Returns the number of records removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let now_ms = current_timestamp_ms();
        let scan_prefix = self.key("");
        let mut batch: EvictionBatch<Vec<u8>> = EvictionBatch::new(self.eviction_batch);
        let mut purged = 0usize;

        for item in self.db.scan_prefix(scan_prefix.as_bytes()) {
            let (key, value) = item?;
            let expired = match read_expiry(&value) {
                Ok(expires_at) => expired_at(expires_at, now_ms),
                Err(_) => false,
            };
            if expired {
                batch.push(key.to_vec(), |keys| {
                    purged += self.delete_expired_batch(keys, now_ms)?;
                    Ok(())
                })?;
            }
        }

        let summary = batch.finish(|keys| {
            purged += self.delete_expired_batch(keys, now_ms)?;
            Ok(())
        })?;

        self.stats.record_removals(purged as u64);
        debug!(
            "Purged {} expired entries in {} batches",
            purged, summary.batches
        );
        Ok(purged)
    }

    // == Lifecycle ==
    /// Flushes pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Flushes and releases the database.
    pub fn close(self) -> Result<()> {
        self.flush()?;
        info!("Embedded cache closed (prefix={})", self.prefix);
        Ok(())
    }
}

impl Cache for EmbeddedCache {
    fn get<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let result = self
            .read_record(key)
            .and_then(|record| decode_value(key, &record.payload));

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
        let record = StoredRecord::new(payload, ttl_seconds);

        self.db.insert(self.key(key).as_bytes(), record.to_bytes())?;
        self.stats.record_write();
        debug!("set {} (ttl={:?})", key, ttl_seconds);
        Ok(())
    }

    fn forget(&self, key: &str) -> Result<()> {
        if self.db.remove(self.key(key).as_bytes())?.is_some() {
            self.stats.record_removals(1);
        }
        Ok(())
    }

    fn empty_by_match(&self, prefix: &str) -> Result<()> {
        let scan_prefix = self.key(prefix);
        let summary = self.evict_prefix(scan_prefix.as_bytes())?;

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
