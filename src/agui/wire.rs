//! Request/response DTOs for the AG-UI HTTP boundary (§6 wire surface).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AguiToolCallFunction {
    pub name: String,
    /// Arguments as a raw JSON-encoded string, not yet parsed.
    pub arguments: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AguiToolCall {
    pub id: String,
    pub function: AguiToolCallFunction,
}

/// One message in a `RunAgentInput` request, matching the AG-UI message
/// shape rather than this crate's own richer [`crate::message::Message`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AguiMessage {
    pub id: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<AguiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// A client-declared tool the frontend knows how to execute. Merged with
/// the agent's own registered tools per `AgUiAdapterConfig::tool_merge_mode`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AguiToolDeclaration {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAgentInput {
    pub thread_id: String,
    pub run_id: String,
    pub messages: Vec<AguiMessage>,
    #[serde(default)]
    pub tools: Vec<AguiToolDeclaration>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub forwarded_props: Option<Value>,
}

impl AguiMessage {
    /// Converts into this crate's own `Message`, dropping protocol-only
    /// fields (`toolCalls`/`toolCallId` are not round-tripped — a request
    /// replaying tool calls is expected to resolve them via the thread's
    /// own memory, not by re-synthesizing `ToolUseBlock`s from the wire).
    pub fn to_message(&self) -> crate::message::Message {
        use crate::message::{ContentBlock, Message, Role};
        let role = match self.role.as_str() {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            _ => Role::User,
        };
        let text = self.content.clone().unwrap_or_default();
        Message::new(role, vec![ContentBlock::text(text)]).with_id(self.id.clone())
    }
}
