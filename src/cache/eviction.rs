//! Batched Prefix Eviction
//!
//! Collect-then-delete driver shared by both backends. Keys found by a scan are
//! copied into a bounded buffer; each time it fills, one delete transaction
//! removes the whole buffer. Whatever remains when the scan ends is flushed by
//! [`EvictionBatch::finish`].

use tracing::debug;

use crate::error::Result;

// == Eviction Summary ==
/// Outcome of one batched eviction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionSummary {
    /// Keys handed to delete transactions
    pub keys_removed: u64,
    /// Delete transactions issued
    pub batches: u64,
}

// == Eviction Batch ==
/// Bounded buffer of keys awaiting deletion.
///
/// The caller owns both the scan and the delete primitive; the batch only
/// decides when to flush. No flush ever receives more than `capacity` keys.
#[derive(Debug)]
pub struct EvictionBatch<K> {
    keys: Vec<K>,
    capacity: usize,
    summary: EvictionSummary,
}

impl<K> EvictionBatch<K> {
    /// Creates an empty batch. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            keys: Vec::with_capacity(capacity.min(4096)),
            capacity,
            summary: EvictionSummary::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys currently buffered.
    pub fn pending(&self) -> usize {
        self.keys.len()
    }

    // == Push ==
    /// Buffers a key, flushing through `delete` once the buffer is full.
    pub fn push<F>(&mut self, key: K, delete: F) -> Result<()>
    where
        F: FnOnce(&[K]) -> Result<()>,
    {
        self.keys.push(key);
        if self.keys.len() >= self.capacity {
            self.flush(delete)?;
        }
        Ok(())
    }

    // == Finish ==
    /// Flushes the final partial batch and reports totals.
    pub fn finish<F>(mut self, delete: F) -> Result<EvictionSummary>
    where
        F: FnOnce(&[K]) -> Result<()>,
    {
        if !self.keys.is_empty() {
            self.flush(delete)?;
        }
        Ok(self.summary)
    }

    fn flush<F>(&mut self, delete: F) -> Result<()>
    where
        F: FnOnce(&[K]) -> Result<()>,
    {
        delete(&self.keys)?;

        self.summary.keys_removed += self.keys.len() as u64;
        self.summary.batches += 1;
        debug!(
            "Eviction batch {} flushed {} keys",
            self.summary.batches,
            self.keys.len()
        );

        self.keys.clear();
        Ok(())
    }
}
