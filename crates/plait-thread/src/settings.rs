use serde::{Deserialize, Serialize};

/// Modifier required alongside Enter to send a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendModifier {
    None,
    #[default]
    Shift,
    Mod,
    Alt,
    Meta,
}

/// Thread-level behavior settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSettings {
    /// Prepended to the thread as the system-role message. May contain
    /// `{{folder_tree}}`, expanded through the host formatter.
    pub system_prompt: String,

    /// Stream responses instead of waiting for the full turn.
    pub stream: bool,

    /// Language for keyword detection and the initial greeting.
    pub language: String,

    /// Trigger a lookup when the user message references "my notes" etc.
    pub detect_self_referential: bool,

    /// Show retrieved context for approval before sending to the model.
    pub review_context: bool,

    /// Offer registered actions as tools on each request.
    pub use_tool_calls: bool,

    pub send_modifier: SendModifier,
}

impl Default for ThreadSettings {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            stream: true,
            language: "en".to_string(),
            detect_self_referential: true,
            review_context: true,
            use_tool_calls: true,
            send_modifier: SendModifier::Shift,
        }
    }
}
