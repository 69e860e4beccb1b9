use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::error::Result;
use crate::persister::Persister;

/// Dirty-key set feeding a batched persistence flush.
///
/// `queue` marks an item dirty; `flush` drains the set and hands the keys
/// to a [`Persister`]. Queueing the same key repeatedly collapses to one
/// pending entry, and flushing an empty queue is a no-op, so both sides
/// are safe to call redundantly.
#[derive(Debug, Default)]
pub struct SaveQueue {
    pending: Mutex<BTreeSet<String>>,
}

impl SaveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as needing persistence.
    pub fn queue(&self, key: &str) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.insert(key.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Take all pending keys, leaving the queue empty.
    pub fn drain(&self) -> Vec<String> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *pending).into_iter().collect()
    }

    /// Drain the queue and persist the pending keys.
    ///
    /// Returns the number of keys flushed. On persister failure the keys
    /// are re-queued so a later flush can retry them.
    pub async fn flush(&self, persister: &dyn Persister) -> Result<usize> {
        let keys = self.drain();
        if keys.is_empty() {
            return Ok(0);
        }
        match persister.persist(&keys).await {
            Ok(()) => Ok(keys.len()),
            Err(e) => {
                tracing::error!(error = %e, "save flush failed; re-queueing {} keys", keys.len());
                for key in &keys {
                    self.queue(key);
                }
                Err(e)
            }
        }
    }
}
