use serde::{Deserialize, Serialize};

use super::content::Content;
use super::tool::ToolCall;

/// One request message, tagged by role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    /// Instructions prepended to the conversation.
    System { content: Content },

    /// User turn.
    User { content: Content },

    /// Model turn: text, tool calls, or both.
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<Content>,

        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },

    /// Tool result fed back to the model.
    Tool { tool_call_id: String, content: Content },
}

impl Message {
    pub fn system(content: impl Into<Content>) -> Self {
        Self::System { content: content.into() }
    }

    pub fn user(content: impl Into<Content>) -> Self {
        Self::User { content: content.into() }
    }

    pub fn assistant(content: impl Into<Content>) -> Self {
        Self::Assistant {
            content: Some(content.into()),
            tool_calls: None,
        }
    }

    pub fn assistant_with_tools(tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            content: None,
            tool_calls: Some(tool_calls),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<Content>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
        }
    }

    pub fn role(&self) -> &str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::Tool { .. } => "tool",
        }
    }

    /// Content identity for first-seen-wins deduplication.
    ///
    /// Role is deliberately ignored: a context block repeated as a user
    /// message in one turn and inside a system message in another is still
    /// the same content. Messages without content are never duplicates.
    pub fn dedup_key(&self) -> Option<String> {
        match self {
            Self::System { content } | Self::User { content } | Self::Tool { content, .. } => {
                Some(content.dedup_key())
            }
            Self::Assistant { content, .. } => content.as_ref().map(Content::dedup_key),
        }
    }
}
