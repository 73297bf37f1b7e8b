//! Tool invocation contract (§4.4).
//!
//! Grounded in `tool_protocol.rs`'s `ToolResult`/`ToolMetadata`/
//! `ToolParameter` shape and `tool_adapters.rs`'s `CustomToolAdapter`
//! registration pattern, generalized so a tool's output is always
//! normalized into a `ToolResultBlock` sharing the originating
//! `ToolUseBlock`'s id, and a failure becomes an error `TextBlock` inside
//! that result rather than propagating.

use crate::error::ToolError;
use crate::message::{ContentBlock, Message, ToolUseBlock};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Static description of a tool, enumerable by a `Formatter` or the
/// AG-UI adapter without invoking the tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
    /// Whether this tool is safe to run concurrently with other tools in
    /// the same assistant turn (§9 Open Questions: default sequential
    /// unless a tool opts in).
    pub parallel_safe: bool,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters_schema: Value) -> Self {
        Self { name: name.into(), description: description.into(), parameters_schema, parallel_safe: false }
    }

    pub fn parallel_safe(mut self) -> Self {
        self.parallel_safe = true;
        self
    }
}

/// A tool a [`crate::agent::react_loop::ReactLoop`] can invoke.
///
/// The invocation must be idempotent from the runtime's perspective —
/// repeated calls with the same input are permitted and the loop may
/// retry a failed call unconditionally.
#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn invoke(&self, input: serde_json::Map<String, Value>) -> Result<Vec<ContentBlock>, ToolError>;
}

/// Registry of tools available to a ReAct run, keyed by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.spec().name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list_specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs the tool named by `call.name` against `call.input` and
    /// normalizes the outcome into a tool-role `Message` carrying a
    /// `ToolResultBlock` whose id matches `call.id`. A missing tool or a
    /// `ToolError` both become an error `TextBlock` inside that result —
    /// the loop always continues regardless of which happened.
    pub async fn execute(&self, call: &ToolUseBlock) -> Message {
        match self.get(&call.name) {
            Some(tool) => match tool.invoke(call.input.clone()).await {
                Ok(output) => Message::new(
                    crate::message::Role::Tool,
                    vec![ContentBlock::tool_result(call.id.clone(), call.name.clone(), output)],
                ),
                Err(e) => {
                    log::warn!("tool `{}` failed: {e}", call.name);
                    Message::new(
                        crate::message::Role::Tool,
                        vec![ContentBlock::tool_error(call.id.clone(), call.name.clone(), e.to_string())],
                    )
                }
            },
            None => Message::new(
                crate::message::Role::Tool,
                vec![ContentBlock::tool_error(call.id.clone(), call.name.clone(), format!("unknown tool `{}`", call.name))],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("echo", "echoes its `text` argument", serde_json::json!({"type": "object"}))
        }

        async fn invoke(&self, input: serde_json::Map<String, Value>) -> Result<Vec<ContentBlock>, ToolError> {
            let text = input.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            Ok(vec![ContentBlock::text(text)])
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("boom", "always fails", serde_json::json!({"type": "object"}))
        }

        async fn invoke(&self, _input: serde_json::Map<String, Value>) -> Result<Vec<ContentBlock>, ToolError> {
            Err(ToolError::new("boom", "kaboom"))
        }
    }

    fn call(id: &str, name: &str) -> ToolUseBlock {
        ToolUseBlock { id: id.to_string(), name: name.to_string(), input: serde_json::Map::new(), content: None }
    }

    #[tokio::test]
    async fn execute_normalizes_success_into_tool_result_sharing_id() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let result = registry.execute(&call("tc-1", "echo")).await;
        match &result.content[0] {
            ContentBlock::ToolResult(tr) => assert_eq!(tr.id, "tc-1"),
            _ => panic!("expected a tool result block"),
        }
    }

    #[tokio::test]
    async fn execute_normalizes_tool_error_into_error_text_block() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool));
        let result = registry.execute(&call("tc-2", "boom")).await;
        match &result.content[0] {
            ContentBlock::ToolResult(tr) => {
                assert!(tr.is_error);
                assert_eq!(tr.id, "tc-2");
            }
            _ => panic!("expected a tool result block"),
        }
    }

    #[tokio::test]
    async fn execute_on_unknown_tool_reports_error_without_panicking() {
        let registry = ToolRegistry::new();
        let result = registry.execute(&call("tc-3", "nonexistent")).await;
        match &result.content[0] {
            ContentBlock::ToolResult(tr) => assert!(tr.is_error),
            _ => panic!("expected a tool result block"),
        }
    }
}
