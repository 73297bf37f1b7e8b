//! Translates C4's internal [`AgentEvent`] stream into a protocol-
//! conformant AG-UI event stream (C5, §4.5).
//!
//! Grounded in `openai_sse/mod.rs`'s `StreamToSse` (stateful `feed`
//! producing buffered output lines from an internal event type),
//! generalized from OpenAI chat-completion chunks to AG-UI's richer
//! lifecycle event set, with the seen-start/seen-end bookkeeping §4.5
//! requires for de-duplication and back-fill.

use crate::agent::event::{AgentEvent, EventType};
use crate::agent::tool::ToolSpec;
use crate::agui::event::{diff_json, AguiEvent};
use crate::agui::wire::AguiToolDeclaration;
use crate::message::ContentBlock;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMergeMode {
    /// Only the frontend's declared tools are exposed to the model.
    FrontendOnly,
    /// Only the agent's own registered tools are exposed.
    AgentOnly,
    /// Both are exposed; on a name collision the frontend's declaration
    /// wins (it is presumed more current for this run).
    MergeFrontendPriority,
}

#[derive(Debug, Clone)]
pub struct AgUiAdapterConfig {
    pub tool_merge_mode: ToolMergeMode,
    pub emit_state_events: bool,
    pub emit_tool_call_args: bool,
    pub enable_reasoning: bool,
    pub run_timeout: Option<Duration>,
    pub default_agent_id: String,
}

impl Default for AgUiAdapterConfig {
    fn default() -> Self {
        Self {
            tool_merge_mode: ToolMergeMode::MergeFrontendPriority,
            emit_state_events: false,
            emit_tool_call_args: true,
            enable_reasoning: false,
            run_timeout: None,
            default_agent_id: "default".to_string(),
        }
    }
}

/// Combines an agent's own tool specs with the frontend's declared tools
/// per `mode`, for inclusion in the model-facing tool list.
pub fn merge_tool_specs(agent_specs: Vec<ToolSpec>, frontend: &[AguiToolDeclaration], mode: ToolMergeMode) -> Vec<ToolSpec> {
    let frontend_specs = frontend.iter().map(|t| ToolSpec::new(t.name.clone(), t.description.clone(), t.parameters.clone()));
    match mode {
        ToolMergeMode::FrontendOnly => frontend_specs.collect(),
        ToolMergeMode::AgentOnly => agent_specs,
        ToolMergeMode::MergeFrontendPriority => {
            let mut by_name: HashMap<String, ToolSpec> = agent_specs.into_iter().map(|s| (s.name.clone(), s)).collect();
            for spec in frontend_specs {
                by_name.insert(spec.name.clone(), spec);
            }
            by_name.into_values().collect()
        }
    }
}

/// Per-run translation state: seen-start/seen-end sets and the mapping
/// from an assistant message id to the tool-call ids it opened, so a
/// message's `last=true` event can close exactly the calls it started
/// (§4.5 Lifecycle invariants, §5 "AG-UI seen-start sets are per-run").
pub struct AgUiAdapter {
    pub thread_id: String,
    pub run_id: String,
    config: AgUiAdapterConfig,
    started_text: HashSet<String>,
    ended_text: HashSet<String>,
    started_reasoning: HashSet<String>,
    ended_reasoning: HashSet<String>,
    started_tool_calls: HashSet<String>,
    ended_tool_calls: HashSet<String>,
    tool_calls_opened_by_message: HashMap<String, Vec<String>>,
    /// Count of `event.message.content` blocks already translated for a
    /// given reasoning message id. The final (`last=true`) `Reasoning`
    /// event carries the turn's fully assembled content (a superset of
    /// every non-final chunk already forwarded); this lets `translate`
    /// skip the blocks it already emitted instead of re-emitting them.
    emitted_block_count: HashMap<String, usize>,
    last_state: serde_json::Value,
}

impl AgUiAdapter {
    pub fn new(thread_id: impl Into<String>, run_id: impl Into<String>, config: AgUiAdapterConfig) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            config,
            started_text: HashSet::new(),
            ended_text: HashSet::new(),
            started_reasoning: HashSet::new(),
            ended_reasoning: HashSet::new(),
            started_tool_calls: HashSet::new(),
            ended_tool_calls: HashSet::new(),
            tool_calls_opened_by_message: HashMap::new(),
            emitted_block_count: HashMap::new(),
            last_state: serde_json::Value::Null,
        }
    }

    pub fn run_started(&self) -> AguiEvent {
        AguiEvent::RunStarted { thread_id: self.thread_id.clone(), run_id: self.run_id.clone() }
    }

    pub fn run_finished(&self) -> AguiEvent {
        AguiEvent::RunFinished { thread_id: self.thread_id.clone(), run_id: self.run_id.clone() }
    }

    /// Diffs `new_state` against the last state passed to this method and
    /// returns a `StateDelta` (or `StateSnapshot` the first time) if they
    /// differ and `emitStateEvents` is enabled; empty otherwise (§4.5
    /// State events).
    pub fn emit_state(&mut self, new_state: serde_json::Value) -> Vec<AguiEvent> {
        if !self.config.emit_state_events {
            return Vec::new();
        }
        if self.last_state.is_null() {
            self.last_state = new_state.clone();
            return vec![AguiEvent::StateSnapshot { state: new_state }];
        }
        let patch = diff_json(&self.last_state, &new_state, "");
        self.last_state = new_state;
        if patch.is_empty() {
            return Vec::new();
        }
        vec![AguiEvent::StateDelta { patch: patch.into_iter().map(|op| serde_json::to_value(op).expect("PatchOp serializes")).collect() }]
    }

    /// Translates one internal event into zero or more AG-UI events,
    /// updating de-duplication/back-fill state as a side effect.
    pub fn translate(&mut self, event: &AgentEvent) -> Vec<AguiEvent> {
        match event.event_type {
            EventType::Finish => {
                let mut out = Vec::new();
                self.close_message(&event.message.id, &mut out);
                out
            }
            EventType::ToolResult => self.translate_tool_result(event),
            EventType::Reasoning => self.translate_reasoning(event),
        }
    }

    /// Translates a model error into a terminal `Raw` envelope; the caller
    /// still emits `run_finished()` afterward (§4.5/§7 propagation policy).
    pub fn translate_error(&self, error: &crate::error::AgentCoreError) -> AguiEvent {
        AguiEvent::Raw { payload: serde_json::json!({"error": error.to_string()}) }
    }

    fn translate_reasoning(&mut self, event: &AgentEvent) -> Vec<AguiEvent> {
        let message_id = &event.message.id;
        let mut out = Vec::new();
        let already_emitted = self.emitted_block_count.get(message_id).copied().unwrap_or(0);
        let total = event.message.content.len();
        for block in event.message.content.iter().skip(already_emitted) {
            match block {
                ContentBlock::Text(t) => {
                    if self.started_text.insert(message_id.clone()) {
                        out.push(AguiEvent::TextMessageStart { message_id: message_id.clone(), role: "assistant".to_string() });
                    }
                    out.push(AguiEvent::TextMessageContent { message_id: message_id.clone(), delta: t.text.clone() });
                }
                ContentBlock::Thinking(t) => {
                    if !self.config.enable_reasoning {
                        continue;
                    }
                    if self.started_reasoning.insert(message_id.clone()) {
                        out.push(AguiEvent::ReasoningMessageStart { message_id: message_id.clone() });
                    }
                    out.push(AguiEvent::ReasoningMessageContent { message_id: message_id.clone(), delta: t.thinking.clone() });
                }
                ContentBlock::ToolUse(tu) => {
                    if self.started_tool_calls.insert(tu.id.clone()) {
                        out.push(AguiEvent::ToolCallStart { tool_call_id: tu.id.clone(), tool_call_name: tu.name.clone() });
                        self.tool_calls_opened_by_message.entry(message_id.clone()).or_default().push(tu.id.clone());
                    }
                    if self.config.emit_tool_call_args {
                        let delta = serde_json::to_string(&tu.input).unwrap_or_default();
                        out.push(AguiEvent::ToolCallArgs { tool_call_id: tu.id.clone(), delta });
                    }
                }
                ContentBlock::ToolResult(_) | ContentBlock::Image(_) => {}
            }
        }
        self.emitted_block_count.insert(message_id.clone(), total.max(already_emitted));
        if event.last {
            self.close_message(message_id, &mut out);
        }
        out
    }

    fn translate_tool_result(&mut self, event: &AgentEvent) -> Vec<AguiEvent> {
        let mut out = Vec::new();
        for block in &event.message.content {
            if let ContentBlock::ToolResult(tr) = block {
                if self.started_tool_calls.insert(tr.id.clone()) {
                    out.push(AguiEvent::ToolCallStart { tool_call_id: tr.id.clone(), tool_call_name: tr.name.clone() });
                }
                if self.ended_tool_calls.insert(tr.id.clone()) {
                    out.push(AguiEvent::ToolCallEnd { tool_call_id: tr.id.clone() });
                }
                let content = tr.output.iter().filter_map(ContentBlock::as_text).collect::<Vec<_>>().join("");
                out.push(AguiEvent::ToolCallResult { tool_call_id: tr.id.clone(), content });
            }
        }
        out
    }

    /// Closes whatever `message_id` left open: its text message, its
    /// reasoning message, and every tool call it started that has not
    /// already been ended by a `ToolResult` event.
    fn close_message(&mut self, message_id: &str, out: &mut Vec<AguiEvent>) {
        if self.started_text.contains(message_id) && self.ended_text.insert(message_id.to_string()) {
            out.push(AguiEvent::TextMessageEnd { message_id: message_id.to_string() });
        }
        if self.started_reasoning.contains(message_id) && self.ended_reasoning.insert(message_id.to_string()) {
            out.push(AguiEvent::ReasoningMessageEnd { message_id: message_id.to_string() });
        }
        if let Some(opened) = self.tool_calls_opened_by_message.remove(message_id) {
            for id in opened {
                if self.ended_tool_calls.insert(id.clone()) {
                    out.push(AguiEvent::ToolCallEnd { tool_call_id: id });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn adapter() -> AgUiAdapter {
        AgUiAdapter::new("t1", "r1", AgUiAdapterConfig::default())
    }

    #[test]
    fn scenario_s1_single_chunk_text_turn() {
        let mut a = adapter();
        let msg = Message::assistant(vec![ContentBlock::text("Hi")]).with_id("m1");
        let mut events = a.translate(&AgentEvent::reasoning(msg.clone(), false));
        events.extend(a.translate(&AgentEvent::reasoning(msg, true)));
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                AguiEvent::TextMessageStart { .. } => "start",
                AguiEvent::TextMessageContent { .. } => "content",
                AguiEvent::TextMessageEnd { .. } => "end",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["start", "content", "end"]);
    }

    #[test]
    fn scenario_s2_tool_round_trip_emits_start_args_end_result_in_order() {
        let mut a = adapter();
        let mut input = serde_json::Map::new();
        input.insert("city".to_string(), serde_json::json!("Beijing"));
        let tool_use_msg = Message::assistant(vec![ContentBlock::tool_use("tc-1", "get_weather", input)]).with_id("m1");
        let mut events = a.translate(&AgentEvent::reasoning(tool_use_msg.clone(), false));
        events.extend(a.translate(&AgentEvent::reasoning(tool_use_msg, true)));
        let tool_result_msg = Message::tool_result("tc-1", "get_weather", vec![ContentBlock::text("sunny, 25C")]);
        events.extend(a.translate(&AgentEvent::tool_result(tool_result_msg)));

        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                AguiEvent::ToolCallStart { .. } => "start",
                AguiEvent::ToolCallArgs { .. } => "args",
                AguiEvent::ToolCallEnd { .. } => "end",
                AguiEvent::ToolCallResult { .. } => "result",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["start", "args", "end", "result"]);
    }

    #[test]
    fn scenario_s5_back_fill_synthesizes_start_and_end_before_result() {
        let mut a = adapter();
        let tool_result_msg = Message::tool_result("tc-9", "unseen_tool", vec![ContentBlock::text("ok")]);
        let events = a.translate(&AgentEvent::tool_result(tool_result_msg));
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                AguiEvent::ToolCallStart { .. } => "start",
                AguiEvent::ToolCallEnd { .. } => "end",
                AguiEvent::ToolCallResult { .. } => "result",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["start", "end", "result"]);
    }

    #[test]
    fn scenario_s6_duplicate_tool_use_blocks_emit_exactly_one_start() {
        let mut a = adapter();
        let mut input = serde_json::Map::new();
        input.insert("q".to_string(), serde_json::json!("x"));
        let msg = Message::assistant(vec![ContentBlock::tool_use("tc-1", "search", input)]).with_id("m1");
        let mut starts = 0;
        for e in a.translate(&AgentEvent::reasoning(msg.clone(), false)) {
            if matches!(e, AguiEvent::ToolCallStart { .. }) {
                starts += 1;
            }
        }
        for e in a.translate(&AgentEvent::reasoning(msg, false)) {
            if matches!(e, AguiEvent::ToolCallStart { .. }) {
                starts += 1;
            }
        }
        assert_eq!(starts, 1);
    }

    #[test]
    fn state_diff_is_empty_when_nothing_changed() {
        let mut a = AgUiAdapter::new("t1", "r1", AgUiAdapterConfig { emit_state_events: true, ..AgUiAdapterConfig::default() });
        let first = a.emit_state(serde_json::json!({"a": 1}));
        assert_eq!(first.len(), 1);
        let second = a.emit_state(serde_json::json!({"a": 1}));
        assert!(second.is_empty());
    }
}
