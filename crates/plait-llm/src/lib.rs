//! Provider-agnostic model invoker contract.
//!
//! Message and tool types, the [`ModelInvoker`] trait, and the streaming
//! event model shared by streaming and non-streaming completions. Concrete
//! provider adapters (HTTP clients, local runtimes) implement
//! [`ModelInvoker`] outside this workspace.

pub mod streaming;
pub mod traits;
pub mod types;

pub use streaming::{replay_response, EventStream, StreamEvent, ToolCallAccumulator};
pub use traits::{CompletionRequest, ModelInvoker, ModelResponse, RequestOptions, TokenUsage};
pub use types::{
    Content, ContentPart, Message, ModelSelection, Tool, ToolCall, ToolChoice, ToolChoiceMode,
};
