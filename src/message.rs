//! Message & content-block model (C1).
//!
//! Generalizes a flat role + string body into a tagged content-block
//! sequence so a single assistant turn can carry text, thinking, tool use,
//! tool results, and images side by side.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Where an `ImageBlock`'s bytes come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { data: String, media_type: String },
    Url { url: String },
}

/// One element of a message's content sequence.
///
/// Modeled as an exhaustive tagged sum rather than an open trait hierarchy,
/// per the design note against dynamic dispatch over content blocks:
/// routing logic in the ReAct loop and the AG-UI adapter matches on this
/// enum directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(TextBlock),
    Thinking(ThinkingBlock),
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
    Image(ImageBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingBlock {
    pub thinking: String,
}

/// A model-initiated tool call. `content` is the raw, not-yet-parsed
/// arguments string when the model streams arguments incrementally (the
/// same field the teacher's `NativeToolCall` keeps next to the already
/// parsed JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    pub input: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// The observation produced by running a `ToolUseBlock`. `id` always
/// matches the originating `ToolUseBlock::id` so the adapter and the model
/// can correlate call and result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub id: String,
    pub name: String,
    pub output: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    pub source: ImageSource,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text(TextBlock { text: text.into() })
    }

    pub fn thinking(thinking: impl Into<String>) -> Self {
        ContentBlock::Thinking(ThinkingBlock { thinking: thinking.into() })
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: serde_json::Map<String, serde_json::Value>) -> Self {
        ContentBlock::ToolUse(ToolUseBlock { id: id.into(), name: name.into(), input, content: None })
    }

    pub fn tool_result(id: impl Into<String>, name: impl Into<String>, output: Vec<ContentBlock>) -> Self {
        ContentBlock::ToolResult(ToolResultBlock { id: id.into(), name: name.into(), output, is_error: false })
    }

    pub fn tool_error(id: impl Into<String>, name: impl Into<String>, message: impl Into<String>) -> Self {
        ContentBlock::ToolResult(ToolResultBlock {
            id: id.into(),
            name: name.into(),
            output: vec![ContentBlock::text(message)],
            is_error: true,
        })
    }

    /// Concatenation of every `TextBlock`'s text in this block (empty for
    /// non-text blocks), used by `call()` to extract the final answer and
    /// by char-counting.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text(t) => Some(&t.text),
            _ => None,
        }
    }
}

/// An immutable, identified unit of conversation.
///
/// Once constructed a `Message` is never mutated in place; the short-term
/// memory log replaces entries wholesale (`replaceRange`) rather than
/// editing them, mirroring the spec's append-only value invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: Vec<ContentBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { id: Uuid::new_v4().to_string(), role, name: None, content, metadata: None }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the metadata map once. The spec treats metadata as
    /// shallow-immutable after it is set; callers who need to change it
    /// construct a fresh `Message` (e.g. via `replaceRange`).
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentBlock::text(text)])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool_result(id: impl Into<String>, name: impl Into<String>, output: Vec<ContentBlock>) -> Self {
        Self::new(Role::Tool, vec![ContentBlock::tool_result(id, name, output)])
    }

    /// All `ToolUseBlock`s in this message, in document order.
    pub fn tool_uses(&self) -> Vec<&ToolUseBlock> {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse(tu) => Some(tu),
                _ => None,
            })
            .collect()
    }

    /// True if every content block is a `TextBlock` (used to decide whether
    /// a message is eligible as the final textual answer).
    pub fn is_pure_text(&self) -> bool {
        !self.content.is_empty() && self.content.iter().all(|b| matches!(b, ContentBlock::Text(_)))
    }

    /// Concatenates all `TextBlock` text in document order. Empty if there
    /// is none.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_has_unique_auto_id() {
        let a = Message::user("hi");
        let b = Message::user("hi");
        assert_ne!(a.id, b.id);
        assert_eq!(a.role, Role::User);
    }

    #[test]
    fn text_concatenates_in_order() {
        let m = Message::assistant(vec![ContentBlock::text("a"), ContentBlock::thinking("skip"), ContentBlock::text("b")]);
        assert_eq!(m.text(), "ab");
    }

    #[test]
    fn tool_uses_extracts_in_document_order() {
        let mut input = serde_json::Map::new();
        input.insert("city".into(), serde_json::json!("Beijing"));
        let m = Message::assistant(vec![
            ContentBlock::text("checking weather"),
            ContentBlock::tool_use("tc-1", "get_weather", input),
        ]);
        let uses = m.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].id, "tc-1");
    }

    #[test]
    fn metadata_round_trips_through_serde() {
        let mut meta = HashMap::new();
        meta.insert("k".to_string(), serde_json::json!(1));
        let m = Message::user("hi").with_metadata(meta);
        let json = serde_json::to_string(&m).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.metadata.unwrap().get("k").unwrap(), &serde_json::json!(1));
    }
}
