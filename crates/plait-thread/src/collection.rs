use std::collections::HashMap;

use chrono::Local;
use plait_store::{Persister, Result, SaveQueue};

use crate::settings::ThreadSettings;
use crate::thread::Thread;

/// Owns the threads. One thread is considered active at a time; the
/// pointer self-heals when it names a deleted or missing thread.
#[derive(Debug, Default)]
pub struct ThreadCollection {
    threads: HashMap<String, Thread>,
    active_thread_key: Option<String>,
    default_settings: ThreadSettings,
    save_queue: SaveQueue,
}

impl ThreadCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(default_settings: ThreadSettings) -> Self {
        Self {
            default_settings,
            ..Self::default()
        }
    }

    /// Create a thread and make it active. Without a key a timestamp-based
    /// default name is generated.
    pub fn create(&mut self, key: Option<String>) -> &mut Thread {
        let key = key.unwrap_or_else(|| Thread::default_key(Local::now()));
        let thread = Thread::with_settings(key.clone(), self.default_settings.clone());
        self.active_thread_key = Some(key.clone());
        self.save_queue.queue(&key);
        self.threads.entry(key).or_insert(thread)
    }

    pub fn get(&self, key: &str) -> Option<&Thread> {
        self.threads.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Thread> {
        self.threads.get_mut(key)
    }

    /// The active thread. Clears and returns nothing when the pointer is
    /// stale (deleted or missing thread).
    pub fn active_thread(&mut self) -> Option<&mut Thread> {
        let key = self.active_thread_key.clone()?;
        let stale = match self.threads.get(&key) {
            Some(thread) => thread.deleted,
            None => true,
        };
        if stale {
            self.active_thread_key = None;
            return None;
        }
        self.threads.get_mut(&key)
    }

    pub fn active_thread_key(&self) -> Option<&str> {
        self.active_thread_key.as_deref()
    }

    pub fn set_active(&mut self, key: Option<&str>) {
        self.active_thread_key = key.map(str::to_string);
    }

    /// Re-key a thread and re-index it. No-op when the source is missing
    /// or the target name is taken.
    pub fn rename(&mut self, old_key: &str, new_key: &str) -> bool {
        if old_key == new_key || self.threads.contains_key(new_key) {
            return false;
        }
        let Some(mut thread) = self.threads.remove(old_key) else {
            tracing::debug!(key = old_key, "rename source not found");
            return false;
        };
        thread.key = new_key.to_string();
        self.threads.insert(new_key.to_string(), thread);
        if self.active_thread_key.as_deref() == Some(old_key) {
            self.active_thread_key = Some(new_key.to_string());
        }
        self.save_queue.queue(new_key);
        true
    }

    /// Soft delete: flag the thread and drop it from the active pointer.
    /// Completions are not removed individually; deletion is per-thread.
    pub fn soft_delete(&mut self, key: &str) -> bool {
        let Some(thread) = self.threads.get_mut(key) else {
            return false;
        };
        thread.deleted = true;
        if self.active_thread_key.as_deref() == Some(key) {
            self.active_thread_key = None;
        }
        self.save_queue.queue(key);
        true
    }

    /// Threads that are not soft-deleted, for history listings.
    pub fn list(&self) -> Vec<&Thread> {
        let mut threads: Vec<&Thread> = self.threads.values().filter(|t| !t.deleted).collect();
        threads.sort_by(|a, b| a.key.cmp(&b.key));
        threads
    }

    pub fn queue_save(&self, key: &str) {
        self.save_queue.queue(key);
    }

    pub async fn process_save_queue(&self, persister: &dyn Persister) -> Result<usize> {
        self.save_queue.flush(persister).await
    }
}
