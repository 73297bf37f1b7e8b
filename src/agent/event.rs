//! The ReAct loop's own event type (C4 output, §3/§4.3).
//!
//! Grounded in `event.rs`'s `AgentEvent` enum and `EventHandler` trait;
//! generalized from CloudLLM's flatter tool-call/response split into the
//! spec's three-variant `{REASONING, TOOL_RESULT, FINISH}` shape with a
//! stable per-turn message id.

use crate::message::Message;
use async_trait::async_trait;
use futures_util::stream::Stream;
use std::pin::Pin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Reasoning,
    ToolResult,
    Finish,
}

/// One element of a ReAct run's event stream.
///
/// For `Reasoning` events, non-final chunks of the same model turn share
/// `message.id`; the final chunk (`last=true`) carries the turn's fully
/// assembled content (see DESIGN.md Open Question 4 for why chunk
/// granularity is modeled this way).
#[derive(Debug, Clone)]
pub struct AgentEvent {
    pub event_type: EventType,
    pub message: Message,
    pub last: bool,
}

impl AgentEvent {
    pub fn reasoning(message: Message, last: bool) -> Self {
        Self { event_type: EventType::Reasoning, message, last }
    }

    pub fn tool_result(message: Message) -> Self {
        Self { event_type: EventType::ToolResult, message, last: true }
    }

    pub fn finish(message: Message) -> Self {
        Self { event_type: EventType::Finish, message, last: true }
    }
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<AgentEvent, crate::error::AgentCoreError>> + Send>>;

/// An optional side-channel that receives the same events the primary
/// stream does, without consuming it — grounded in the teacher's
/// `EventHandler` trait, used there for logging/metrics callbacks that
/// run alongside (not instead of) the agent's own output.
#[async_trait]
pub trait AgentObserver: Send + Sync {
    async fn on_event(&self, event: &AgentEvent);
}
