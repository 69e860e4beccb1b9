use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use plait_llm::Tool;
use serde_json::Value;
use tokio::sync::RwLock;

/// One callable action, described to the model as a tool.
///
/// Results travel back through the tool boundary as JSON data; validation
/// failures are `{"error": …}` values rather than errors, because the
/// model consumes them like any other tool output.
#[async_trait]
pub trait Action: Send + Sync {
    fn key(&self) -> &str;

    /// Tool definition offered to the model.
    fn tool(&self) -> Tool;

    async fn run(&self, params: Value) -> Result<Value>;
}

/// Registry of actions, executed by name.
#[derive(Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Arc<dyn Action>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, action: Arc<dyn Action>) {
        let mut actions = self.actions.write().await;
        actions.insert(action.key().to_string(), action);
    }

    /// All registered tool definitions, for an auto tool-choice request.
    pub async fn tools(&self) -> Vec<Tool> {
        let actions = self.actions.read().await;
        let mut tools: Vec<Tool> = actions.values().map(|a| a.tool()).collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    pub async fn tool_for(&self, key: &str) -> Option<Tool> {
        let actions = self.actions.read().await;
        actions.get(key).map(|a| a.tool())
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.actions.read().await.contains_key(key)
    }

    /// Run the named action with the given JSON parameters.
    pub async fn execute(&self, key: &str, params: Value) -> Result<Value> {
        let action = {
            let actions = self.actions.read().await;
            actions.get(key).cloned()
        };
        match action {
            Some(action) => action.run(params).await,
            None => Err(anyhow::anyhow!("Action '{}' not found", key)),
        }
    }
}
