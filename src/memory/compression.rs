//! The six prioritized compression strategies (§4.2) plus the
//! `CompressionEvent` audit trail and the `Summarizer` collaborator they
//! call into.
//!
//! Grounded in `context_strategy.rs`'s `ContextStrategy` trait: the
//! teacher picks *one* strategy per session (`TrimStrategy`,
//! `SelfCompressionStrategy`, `NoveltyAwareStrategy`); here every pass
//! tries all six in fixed priority order, but the "summarize a span with
//! the model, replace it, keep the rest" shape of
//! `SelfCompressionStrategy::compact` is the template each strategy below
//! follows.

use crate::message::{ContentBlock, Message, Role};
use crate::memory::offload::OffloadTable;
use crate::memory::token_count::{calculate_message_char_count, count_messages_tokens};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;

/// Calls out to the model (or any text-completion collaborator) to
/// summarize a span of messages. A thin slice of the `Model` contract
/// (§6) specialized for one-shot, non-streamed text completions, the same
/// way the teacher's `SelfCompressionStrategy` calls
/// `session.send_message` directly rather than going through the full
/// streaming contract.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, prompt: &str, span: &[Message]) -> Result<String, Box<dyn Error + Send + Sync>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionKind {
    ToolInvocationCompress,
    PreviousRoundSummary,
    CurrentRoundLargeMessage,
    CurrentRoundMessageCompress,
    LargePayloadOffload,
}

/// Audit-trail record of one compression rewrite. Never affects semantics
/// — purely observational provenance.
#[derive(Debug, Clone)]
pub struct CompressionEvent {
    pub kind: CompressionKind,
    pub timestamp: DateTime<Utc>,
    pub compressed_count: usize,
    pub previous_id: Option<String>,
    pub next_id: Option<String>,
    pub compressed_id: String,
    pub metadata: HashMap<String, Value>,
}

impl CompressionEvent {
    fn new(kind: CompressionKind, span: &[Message], compressed_id: String, metadata: HashMap<String, Value>) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            compressed_count: span.len(),
            previous_id: span.first().map(|m| m.id.clone()),
            next_id: span.last().map(|m| m.id.clone()),
            compressed_id,
            metadata,
        }
    }
}

/// Outcome of attempting one strategy against the current working set.
pub enum StrategyOutcome {
    /// The strategy did not find an eligible span.
    NotApplicable,
    /// The strategy rewrote the working set; `working` has already been
    /// mutated in place.
    Applied(CompressionEvent),
    /// The strategy found an eligible span but the summarizer failed; the
    /// working set is unchanged, but the attempt is still recorded.
    Failed(CompressionEvent),
}

pub struct CustomPrompts {
    pub tool_invocation_compress: Option<String>,
    pub previous_round_summary: Option<String>,
    pub current_round_large_message: Option<String>,
    pub current_round_messages_compress: Option<String>,
}

impl Default for CustomPrompts {
    fn default() -> Self {
        Self {
            tool_invocation_compress: None,
            previous_round_summary: None,
            current_round_large_message: None,
            current_round_messages_compress: None,
        }
    }
}

const DEFAULT_TOOL_INVOCATION_PROMPT: &str =
    "Summarize the following tool invocations and their results into a short paragraph a future turn can act on:";
const DEFAULT_PREVIOUS_ROUND_PROMPT: &str =
    "Summarize this earlier exchange between the user and the assistant, preserving any facts the user may refer back to:";
const DEFAULT_LARGE_MESSAGE_PROMPT: &str = "Summarize this oversized message, preserving its key facts and numbers:";
const DEFAULT_CURRENT_ROUND_PROMPT: &str =
    "Summarize the tool activity so far in this round into one concise note:";

fn is_tool_related(message: &Message) -> bool {
    message.role == Role::Tool || message.content.iter().any(|b| matches!(b, ContentBlock::ToolUse(_)))
}

fn latest_index_with_role(working: &[Message], role: Role) -> Option<usize> {
    working.iter().rposition(|m| m.role == role)
}

/// Finds the longest maximal run of tool-related messages within
/// `working[..before]`, returning `(start, end_exclusive)` if its length
/// is `>= min_len`.
fn longest_tool_run(working: &[Message], before: usize, min_len: usize) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut run_start = None;
    for i in 0..before {
        if is_tool_related(&working[i]) {
            if run_start.is_none() {
                run_start = Some(i);
            }
        } else if let Some(start) = run_start.take() {
            if i - start > best.map(|(s, e)| e - s).unwrap_or(0) {
                best = Some((start, i));
            }
        }
    }
    if let Some(start) = run_start {
        if before - start > best.map(|(s, e)| e - s).unwrap_or(0) {
            best = Some((start, before));
        }
    }
    best.filter(|(s, e)| e - s >= min_len)
}

fn token_metadata(before: &[Message], after_tokens: usize) -> HashMap<String, Value> {
    let mut m = HashMap::new();
    m.insert("token_before".to_string(), Value::from(count_messages_tokens(before)));
    m.insert("token_after".to_string(), Value::from(after_tokens));
    m
}

fn prompt_input(plan_hint: Option<&str>, base_prompt: &str) -> String {
    match plan_hint {
        Some(hint) => format!("{hint}\n\n{base_prompt}"),
        None => base_prompt.to_string(),
    }
}

/// Strategy 1: previous-round tool-invocation compression.
pub async fn try_tool_invocation_compress(
    working: &mut Vec<Message>,
    offload: &mut OffloadTable,
    min_consecutive: usize,
    protected_from: usize,
    summarizer: &dyn Summarizer,
    custom_prompt: Option<&str>,
    plan_hint: Option<&str>,
) -> StrategyOutcome {
    let Some(latest_user) = latest_index_with_role(working, Role::User) else {
        return StrategyOutcome::NotApplicable;
    };
    let boundary = latest_user.min(protected_from);
    let Some((start, end)) = longest_tool_run(working, boundary, min_consecutive) else {
        return StrategyOutcome::NotApplicable;
    };
    let span = working[start..end].to_vec();
    let prompt = prompt_input(plan_hint, custom_prompt.unwrap_or(DEFAULT_TOOL_INVOCATION_PROMPT));
    match summarizer.summarize(&prompt, &span).await {
        Ok(summary) => {
            let handle = offload.offload(span.clone());
            let replacement = Message::assistant(vec![ContentBlock::text(format!(
                "{summary}\n\n(full tool run available via reload, uuid:{handle})"
            ))]);
            let compressed_id = replacement.id.clone();
            working.splice(start..end, [replacement]);
            let meta = token_metadata(&span, 0);
            StrategyOutcome::Applied(CompressionEvent::new(CompressionKind::ToolInvocationCompress, &span, compressed_id, meta))
        }
        Err(e) => {
            let mut meta = token_metadata(&span, count_messages_tokens(&span));
            meta.insert("error".to_string(), Value::from(e.to_string()));
            StrategyOutcome::Failed(CompressionEvent::new(CompressionKind::ToolInvocationCompress, &span, String::new(), meta))
        }
    }
}

/// Strategies 2 and 3 share this mechanical offload-and-placeholder logic;
/// they differ only in which slice of the working set is eligible.
fn try_large_payload_offload_in(
    working: &mut Vec<Message>,
    offload: &mut OffloadTable,
    range: std::ops::Range<usize>,
    large_payload_threshold: usize,
    kind: CompressionKind,
) -> StrategyOutcome {
    let Some(index) = range.clone().find(|&i| calculate_message_char_count(&working[i]) > large_payload_threshold) else {
        return StrategyOutcome::NotApplicable;
    };
    let original = working[index].clone();
    let handle = offload.offload(vec![original.clone()]);
    let placeholder = Message::new(original.role, vec![ContentBlock::text(format!(
        "[large payload offloaded, uuid:{handle}]"
    ))])
    .with_id(original.id.clone());
    let compressed_id = placeholder.id.clone();
    working[index] = placeholder;
    let meta = token_metadata(std::slice::from_ref(&original), 0);
    StrategyOutcome::Applied(CompressionEvent::new(kind, std::slice::from_ref(&original), compressed_id, meta))
}

/// Strategy 2: previous-round large-payload offload (before the latest
/// assistant message).
pub fn try_previous_round_large_payload_offload(
    working: &mut Vec<Message>,
    offload: &mut OffloadTable,
    large_payload_threshold: usize,
    protected_from: usize,
) -> StrategyOutcome {
    let Some(latest_assistant) = latest_index_with_role(working, Role::Assistant) else {
        return StrategyOutcome::NotApplicable;
    };
    let end = latest_assistant.min(protected_from);
    try_large_payload_offload_in(working, offload, 0..end, large_payload_threshold, CompressionKind::LargePayloadOffload)
}

/// Strategy 3: current-round large-payload offload (between the latest
/// user message and the latest assistant message).
pub fn try_current_round_large_payload_offload(
    working: &mut Vec<Message>,
    offload: &mut OffloadTable,
    large_payload_threshold: usize,
    protected_from: usize,
) -> StrategyOutcome {
    let (Some(latest_user), Some(latest_assistant)) =
        (latest_index_with_role(working, Role::User), latest_index_with_role(working, Role::Assistant))
    else {
        return StrategyOutcome::NotApplicable;
    };
    if latest_user >= latest_assistant {
        return StrategyOutcome::NotApplicable;
    }
    let end = latest_assistant.min(protected_from);
    if latest_user + 1 >= end {
        return StrategyOutcome::NotApplicable;
    }
    try_large_payload_offload_in(
        working,
        offload,
        latest_user + 1..end,
        large_payload_threshold,
        CompressionKind::LargePayloadOffload,
    )
}

/// Strategy 4: previous-round conversation summary. Finds the first
/// user/assistant pair in the previous rounds that are *not* directly
/// adjacent (i.e. there was tool activity between them) and summarizes the
/// whole span between them, inclusive.
pub async fn try_previous_round_summary(
    working: &mut Vec<Message>,
    offload: &mut OffloadTable,
    protected_from: usize,
    summarizer: &dyn Summarizer,
    custom_prompt: Option<&str>,
    plan_hint: Option<&str>,
) -> StrategyOutcome {
    let Some(latest_user) = latest_index_with_role(working, Role::User) else {
        return StrategyOutcome::NotApplicable;
    };
    let latest_user = latest_user.min(protected_from);
    let mut pair = None;
    let mut i = 0;
    while i < latest_user {
        if working[i].role == Role::User {
            if let Some(assistant_idx) = (i + 1..latest_user)
                .find(|&j| working[j].role == Role::Assistant && !is_tool_related(&working[j]))
            {
                if assistant_idx > i + 1 {
                    pair = Some((i, assistant_idx));
                    break;
                }
                i = assistant_idx + 1;
                continue;
            }
        }
        i += 1;
    }
    let Some((start, end)) = pair else {
        return StrategyOutcome::NotApplicable;
    };
    let span = working[start..=end].to_vec();
    let prompt = prompt_input(plan_hint, custom_prompt.unwrap_or(DEFAULT_PREVIOUS_ROUND_PROMPT));
    match summarizer.summarize(&prompt, &span).await {
        Ok(summary) => {
            offload.offload(span.clone());
            let mut meta = HashMap::new();
            meta.insert("tag".to_string(), Value::from("conversation_summary"));
            let replacement = Message::system(summary).with_metadata(meta);
            let compressed_id = replacement.id.clone();
            working.splice(start..=end, [replacement]);
            let meta = token_metadata(&span, 0);
            StrategyOutcome::Applied(CompressionEvent::new(CompressionKind::PreviousRoundSummary, &span, compressed_id, meta))
        }
        Err(e) => {
            let mut meta = token_metadata(&span, count_messages_tokens(&span));
            meta.insert("error".to_string(), Value::from(e.to_string()));
            StrategyOutcome::Failed(CompressionEvent::new(CompressionKind::PreviousRoundSummary, &span, String::new(), meta))
        }
    }
}

/// Strategy 5: current-round large-message summary.
pub async fn try_current_round_large_message_summary(
    working: &mut Vec<Message>,
    offload: &mut OffloadTable,
    large_payload_threshold: usize,
    protected_from: usize,
    summarizer: &dyn Summarizer,
    custom_prompt: Option<&str>,
    plan_hint: Option<&str>,
) -> StrategyOutcome {
    let Some(latest_user) = latest_index_with_role(working, Role::User) else {
        return StrategyOutcome::NotApplicable;
    };
    let bound = working.len().min(protected_from);
    if latest_user >= bound {
        return StrategyOutcome::NotApplicable;
    }
    let Some(index) =
        (latest_user..bound).find(|&i| calculate_message_char_count(&working[i]) > large_payload_threshold)
    else {
        return StrategyOutcome::NotApplicable;
    };
    let original = working[index].clone();
    let prompt = prompt_input(plan_hint, custom_prompt.unwrap_or(DEFAULT_LARGE_MESSAGE_PROMPT));
    match summarizer.summarize(&prompt, std::slice::from_ref(&original)).await {
        Ok(summary) => {
            let handle = offload.offload(vec![original.clone()]);
            let mut meta = HashMap::new();
            meta.insert("tag".to_string(), Value::from("compressed_large_message"));
            let replacement = Message::new(
                original.role,
                vec![ContentBlock::text(format!("{summary}\n\n(original available via reload, uuid:{handle})"))],
            )
            .with_metadata(meta);
            let compressed_id = replacement.id.clone();
            working[index] = replacement;
            let meta = token_metadata(std::slice::from_ref(&original), 0);
            StrategyOutcome::Applied(CompressionEvent::new(
                CompressionKind::CurrentRoundLargeMessage,
                std::slice::from_ref(&original),
                compressed_id,
                meta,
            ))
        }
        Err(e) => {
            let mut meta = token_metadata(std::slice::from_ref(&original), count_messages_tokens(std::slice::from_ref(&original)));
            meta.insert("error".to_string(), Value::from(e.to_string()));
            StrategyOutcome::Failed(CompressionEvent::new(
                CompressionKind::CurrentRoundLargeMessage,
                std::slice::from_ref(&original),
                String::new(),
                meta,
            ))
        }
    }
}

/// Strategy 6: current-round messages compression. Collapses every
/// tool-related message since the latest user message into one summary.
pub async fn try_current_round_messages_compress(
    working: &mut Vec<Message>,
    offload: &mut OffloadTable,
    protected_from: usize,
    summarizer: &dyn Summarizer,
    custom_prompt: Option<&str>,
    plan_hint: Option<&str>,
) -> StrategyOutcome {
    let Some(latest_user) = latest_index_with_role(working, Role::User) else {
        return StrategyOutcome::NotApplicable;
    };
    let bound = working.len().min(protected_from);
    if latest_user + 1 >= bound {
        return StrategyOutcome::NotApplicable;
    }
    let tool_indices: Vec<usize> = (latest_user + 1..bound).filter(|&i| is_tool_related(&working[i])).collect();
    if tool_indices.is_empty() {
        return StrategyOutcome::NotApplicable;
    }
    let (start, end) = (*tool_indices.first().unwrap(), *tool_indices.last().unwrap() + 1);
    let span = working[start..end].to_vec();
    let prompt = prompt_input(plan_hint, custom_prompt.unwrap_or(DEFAULT_CURRENT_ROUND_PROMPT));
    match summarizer.summarize(&prompt, &span).await {
        Ok(summary) => {
            offload.offload(span.clone());
            let mut meta = HashMap::new();
            meta.insert("tag".to_string(), Value::from("compressed_current_round"));
            let replacement = Message::assistant(vec![ContentBlock::text(summary)]).with_metadata(meta);
            let compressed_id = replacement.id.clone();
            working.splice(start..end, [replacement]);
            let meta = token_metadata(&span, 0);
            StrategyOutcome::Applied(CompressionEvent::new(CompressionKind::CurrentRoundMessageCompress, &span, compressed_id, meta))
        }
        Err(e) => {
            let mut meta = token_metadata(&span, count_messages_tokens(&span));
            meta.insert("error".to_string(), Value::from(e.to_string()));
            StrategyOutcome::Failed(CompressionEvent::new(CompressionKind::CurrentRoundMessageCompress, &span, String::new(), meta))
        }
    }
}
