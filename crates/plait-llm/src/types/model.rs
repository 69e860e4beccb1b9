use serde::{Deserialize, Serialize};

/// Which model serves a completion: model id plus the provider adapter
/// that knows how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelection {
    pub model_id: String,
    pub provider_id: String,
}

impl ModelSelection {
    pub fn new(model_id: impl Into<String>, provider_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            provider_id: provider_id.into(),
        }
    }
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self::new("gpt-4o", "openai")
    }
}
