//! The `Model` external interface (§6) — the only contract a concrete
//! vendor client must satisfy.
//!
//! Grounded in `client_wrapper.rs`'s `ClientWrapper` trait
//! (`send_message`, `send_message_stream` returning a
//! `MessageChunkStream`), generalized from a request/response pair into
//! the spec's `stream(messages, tools, options) → lazy sequence of
//! ChatResponse` contract. Concrete vendor clients are out of scope (§1);
//! only this trait is defined here.

use crate::agent::tool::ToolSpec;
use crate::error::ModelError;
use crate::message::{ContentBlock, Message};
use async_trait::async_trait;
use futures_util::stream::Stream;
use std::collections::HashMap;
use std::pin::Pin;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// One chunk (or, for a non-streaming client, the single complete
/// response) from a model call.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Specific(String),
}

impl Default for ToolChoice {
    fn default() -> Self {
        ToolChoice::Auto
    }
}

/// Per-call options threaded through to the model client. Fields mirror
/// the common knobs the teacher's concrete clients (`clients/openai.rs`
/// and siblings, not retained in this core) each expose on top of
/// `ClientWrapper::send_message`.
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
    pub thinking_budget: Option<u32>,
    pub tool_choice: ToolChoice,
    pub additional_headers: HashMap<String, String>,
    pub additional_body_params: serde_json::Value,
    pub additional_query_params: HashMap<String, String>,
}

pub type ChatResponseStream = Pin<Box<dyn Stream<Item = Result<ChatResponse, ModelError>> + Send>>;

/// Contract a concrete model vendor client must satisfy. The returned
/// stream is finite and not restartable, same as
/// `ClientWrapper::send_message_stream`'s `MessageChunkStream`.
#[async_trait]
pub trait Model: Send + Sync {
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        options: &ModelOptions,
    ) -> Result<ChatResponseStream, ModelError>;

    /// A human-readable identifier for logging (mirrors
    /// `ClientWrapper::model_name`).
    fn model_name(&self) -> &str;
}
