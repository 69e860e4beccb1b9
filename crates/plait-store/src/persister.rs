use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;

/// Sink for flushed save-queue keys.
///
/// Implementations own the actual persistence framing (file layout, wire
/// format); this core only hands over which items became dirty.
#[async_trait]
pub trait Persister: Send + Sync {
    async fn persist(&self, keys: &[String]) -> Result<()>;
}

/// Persister that discards everything. Default wiring for hosts that
/// handle persistence elsewhere.
#[derive(Debug, Default)]
pub struct NullPersister;

#[async_trait]
impl Persister for NullPersister {
    async fn persist(&self, _keys: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Persister that records flushed keys in memory, in flush order.
#[derive(Debug, Default)]
pub struct MemoryPersister {
    saved: Mutex<Vec<String>>,
}

impl MemoryPersister {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys persisted so far, in the order they were flushed.
    pub fn saved(&self) -> Vec<String> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Persister for MemoryPersister {
    async fn persist(&self, keys: &[String]) -> Result<()> {
        let mut saved = self.saved.lock().unwrap_or_else(|e| e.into_inner());
        saved.extend(keys.iter().cloned());
        Ok(())
    }
}
