use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use plait_store::{Persister, Result, SaveQueue};
use uuid::Uuid;

use crate::context::{Context, ContextEntry, ContextItem};

/// Keyed store of [`Context`] objects with a dirty-tracking save queue.
///
/// Contexts are shared by key: callers hold keys, the store holds the
/// canonical object, and merges mutate in place so every completion
/// referencing the key observes the same set.
#[derive(Debug, Default)]
pub struct ContextStore {
    items: RwLock<HashMap<String, Context>>,
    save_queue: SaveQueue,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh context, optionally seeded with items.
    pub fn new_context(&self, initial: Option<BTreeMap<String, ContextItem>>) -> Context {
        let mut context = Context::new(Uuid::new_v4().to_string());
        if let Some(items) = initial {
            context.context_items = items;
        }
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.insert(context.key.clone(), context.clone());
        context
    }

    /// Snapshot of a stored context. Absent keys are a recoverable null,
    /// not an error; reentrant callers hold stale keys routinely.
    pub fn get(&self, key: &str) -> Option<Context> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        items.get(key).cloned()
    }

    pub fn set(&self, context: Context) {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.insert(context.key.clone(), context);
    }

    /// Apply `f` to the stored context, returning whether it existed.
    pub fn update<F: FnOnce(&mut Context)>(&self, key: &str, f: F) -> bool {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        match items.get_mut(key) {
            Some(context) => {
                f(context);
                true
            }
            None => false,
        }
    }

    /// Fold `entries` into the context named by `target`, allocating a new
    /// context when the target is absent. Returns a snapshot of the result
    /// and queues it for persistence.
    pub fn merge_into(&self, target: Option<&str>, entries: &[ContextEntry]) -> Context {
        if let Some(key) = target {
            let merged = {
                let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
                items.get_mut(key).map(|context| {
                    context.merge_entries(entries);
                    context.clone()
                })
            };
            if let Some(context) = merged {
                self.save_queue.queue(&context.key);
                return context;
            }
            tracing::debug!(target = key, "merge target not found; allocating a new context");
        }
        let context = self.new_context(None);
        let context = {
            let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
            let stored = items.entry(context.key.clone()).or_insert(context);
            stored.merge_entries(entries);
            stored.clone()
        };
        self.save_queue.queue(&context.key);
        context
    }

    /// Member keys of `target` for a lookup exclusion filter; empty when
    /// the context is absent.
    pub fn exclusion_keys(&self, target: &str) -> Vec<String> {
        self.get(target)
            .map(|context| context.member_keys())
            .unwrap_or_default()
    }

    pub fn queue_save(&self, key: &str) {
        self.save_queue.queue(key);
    }

    /// Flush pending saves. Safe to call redundantly.
    pub async fn process_save_queue(&self, persister: &dyn Persister) -> Result<usize> {
        self.save_queue.flush(persister).await
    }
}
