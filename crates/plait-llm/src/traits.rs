use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::streaming::EventStream;
use crate::types::{Message, ModelSelection, Tool, ToolCall, ToolChoice};

/// Contract the external model adapter fulfils.
///
/// `complete` resolves the whole turn at once; `complete_stream` yields
/// incremental [`crate::StreamEvent`]s. Providers live outside this core.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<ModelResponse>;

    async fn complete_stream(&self, request: CompletionRequest) -> Result<EventStream>;
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: ModelSelection,
    pub messages: Vec<Message>,
    pub options: RequestOptions,
}

impl CompletionRequest {
    pub fn new(model: ModelSelection, messages: Vec<Message>) -> Self {
        Self {
            model,
            messages,
            options: RequestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tools: Option<Vec<Tool>>,
    pub tool_choice: Option<ToolChoice>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}
