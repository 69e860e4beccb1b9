use std::collections::BTreeMap;
use std::pin::Pin;

use anyhow::Result;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::traits::ModelResponse;
use crate::types::ToolCall;

/// Incremental events produced while a completion streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Partial response text.
    Message { content: String },

    /// Tool-call delta. `id`/`name` arrive once, `arguments` in fragments;
    /// `index` groups fragments belonging to the same call.
    ToolCall {
        index: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },

    /// End of the turn.
    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

/// Boxed event stream, the shape every invoker yields.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Replays a non-streaming response as the equivalent event sequence.
///
/// Lets the non-streaming path drive the same chunk/done pipeline the
/// streaming path uses, so accumulation and persistence behave identically.
pub fn replay_response(response: ModelResponse) -> EventStream {
    Box::pin(async_stream::stream! {
        if let Some(content) = response.content {
            if !content.is_empty() {
                yield Ok(StreamEvent::Message { content });
            }
        }
        if let Some(calls) = response.tool_calls {
            for (index, call) in calls.into_iter().enumerate() {
                yield Ok(StreamEvent::ToolCall {
                    index: index as u32,
                    id: Some(call.id),
                    name: Some(call.function.name),
                    arguments: Some(call.function.arguments),
                });
            }
        }
        yield Ok(StreamEvent::Done { finish_reason: response.finish_reason });
    })
}

/// Folds tool-call deltas into complete calls.
///
/// Fragments are grouped by stream index; a buffer that never received an
/// id and a name is dropped rather than surfaced half-built.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    buffers: BTreeMap<u32, ToolCallBuffer>,
}

#[derive(Debug, Default)]
struct ToolCallBuffer {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, index: u32, id: Option<String>, name: Option<String>, arguments: Option<String>) {
        let entry = self.buffers.entry(index).or_default();
        if let Some(id) = id {
            entry.id = Some(id);
        }
        if let Some(name) = name {
            entry.name = Some(name);
        }
        if let Some(args) = arguments {
            entry.arguments.push_str(&args);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn finish(self) -> Vec<ToolCall> {
        self.buffers
            .into_values()
            .filter_map(|buf| match (buf.id, buf.name) {
                (Some(id), Some(name)) => Some(ToolCall::new(id, name, buf.arguments)),
                _ => {
                    tracing::warn!("dropping incomplete tool-call buffer");
                    None
                }
            })
            .collect()
    }
}
