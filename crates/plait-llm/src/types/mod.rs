mod content;
mod message;
mod model;
mod tool;

pub use content::{Content, ContentPart};
pub use message::Message;
pub use model::ModelSelection;
pub use tool::{FunctionCall, FunctionDefinition, Tool, ToolCall, ToolChoice, ToolChoiceFunction, ToolChoiceMode};
