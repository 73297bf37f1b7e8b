//! Auto-context memory (C3): wraps two [`ShortTermMemory`] logs — the
//! *working* set the model sees and the append-only *original* mirror —
//! with lazy, on-read compaction.
//!
//! Grounded in `context_strategy.rs`'s `ContextStrategy` trait for the
//! "pluggable compaction behind a trait object, driven off message count
//! and a token budget" shape; generalized from one selectable strategy to
//! the spec's fixed six-strategy pipeline.

use crate::memory::compression::{
    self, CompressionEvent, CustomPrompts, StrategyOutcome, Summarizer,
};
use crate::memory::offload::{parse_reload_hint, OffloadTable};
use crate::memory::short_term::ShortTermMemory;
use crate::memory::token_count::count_messages_tokens;
use crate::message::{ContentBlock, Message, Role};
use crate::plan::Plan;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Tunables for the compaction loop (§4.2 Configuration).
pub struct AutoContextConfig {
    pub msg_threshold: usize,
    pub max_token: usize,
    pub token_ratio: f64,
    pub last_keep: usize,
    pub min_consecutive_tool_messages: usize,
    pub large_payload_threshold: usize,
    pub custom_prompts: CustomPrompts,
}

impl Default for AutoContextConfig {
    fn default() -> Self {
        Self {
            msg_threshold: 20,
            max_token: 8_000,
            token_ratio: 0.75,
            last_keep: 6,
            min_consecutive_tool_messages: 3,
            large_payload_threshold: 4_000,
            custom_prompts: CustomPrompts::default(),
        }
    }
}

impl AutoContextConfig {
    pub fn with_msg_threshold(mut self, n: usize) -> Self {
        self.msg_threshold = n;
        self
    }

    pub fn with_max_token(mut self, n: usize) -> Self {
        self.max_token = n;
        self
    }

    pub fn with_token_ratio(mut self, r: f64) -> Self {
        self.token_ratio = r;
        self
    }

    pub fn with_last_keep(mut self, n: usize) -> Self {
        self.last_keep = n;
        self
    }

    pub fn with_min_consecutive_tool_messages(mut self, n: usize) -> Self {
        self.min_consecutive_tool_messages = n;
        self
    }

    pub fn with_large_payload_threshold(mut self, n: usize) -> Self {
        self.large_payload_threshold = n;
        self
    }

    pub fn with_custom_prompts(mut self, prompts: CustomPrompts) -> Self {
        self.custom_prompts = prompts;
        self
    }
}

/// The name of the built-in tool that retrieves an offloaded span by its
/// reload handle.
pub const RELOAD_MEMORY_TOOL_NAME: &str = "reload_memory";

pub struct AutoContextMemory {
    working: ShortTermMemory,
    original: ShortTermMemory,
    offload: OffloadTable,
    config: AutoContextConfig,
    summarizer: Arc<dyn Summarizer>,
    events: Vec<CompressionEvent>,
    plan: Option<Arc<RwLock<Plan>>>,
}

impl AutoContextMemory {
    pub fn new(summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            working: ShortTermMemory::new(),
            original: ShortTermMemory::new(),
            offload: OffloadTable::new(),
            config: AutoContextConfig::default(),
            summarizer,
            events: Vec::new(),
            plan: None,
        }
    }

    pub fn with_config(mut self, config: AutoContextConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches a plan notebook. Its rendered state is inlined as a hint
    /// ahead of every summarization prompt, per §4.2 Plan awareness — this
    /// does not alter the working set.
    pub fn attach_plan(&mut self, plan: Arc<RwLock<Plan>>) {
        self.plan = Some(plan);
    }

    pub fn detach_plan(&mut self) {
        self.plan = None;
    }

    /// Appends to both the working and original logs.
    pub fn add_message(&mut self, message: Message) {
        self.working.append(message.clone());
        self.original.append(message);
    }

    pub fn original_len(&self) -> usize {
        self.original.len()
    }

    pub fn compression_events(&self) -> &[CompressionEvent] {
        &self.events
    }

    pub fn offload_table(&self) -> &OffloadTable {
        &self.offload
    }

    /// `reload(handle) → msgs | []`. Unknown handles produce a single
    /// tool-style error message rather than a thrown error, matching
    /// §4.2's offload/reload contract; this is the body of the built-in
    /// `reload_memory` tool.
    pub fn reload(&self, handle_str: &str) -> Message {
        let Some(handle) = Uuid::parse_str(handle_str.trim_start_matches("uuid:")).ok() else {
            return Message::tool_result(
                "reload_memory",
                RELOAD_MEMORY_TOOL_NAME,
                vec![ContentBlock::text(format!("\"{handle_str}\" is not a valid offload handle"))],
            );
        };
        match self.offload.try_reload(&handle) {
            Ok(messages) => {
                let rendered = messages.iter().map(|m| format!("[{:?}] {}", m.role, m.text())).collect::<Vec<_>>().join("\n");
                Message::tool_result("reload_memory", RELOAD_MEMORY_TOOL_NAME, vec![ContentBlock::text(rendered)])
            }
            Err(e) => Message::tool_result(
                "reload_memory",
                RELOAD_MEMORY_TOOL_NAME,
                vec![ContentBlock::text(e.to_string())],
            ),
        }
    }

    fn should_compact(&self) -> bool {
        let snapshot = self.working.get();
        snapshot.len() > self.config.msg_threshold
            && count_messages_tokens(&snapshot) as f64 > self.config.token_ratio * self.config.max_token as f64
    }

    async fn plan_hint(&self) -> Option<String> {
        match &self.plan {
            Some(plan) => Some(plan.read().await.render()),
            None => None,
        }
    }

    /// Triggers lazy compaction (never performed on write) and returns the
    /// current working set.
    pub async fn get_messages(&mut self) -> Vec<Message> {
        self.compact().await;
        self.working.get()
    }

    async fn compact(&mut self) {
        // Safety backstop: each pass must strictly shrink the working set
        // (or at minimum make progress) or we stop, since a strategy that
        // repeatedly "applies" without reducing token pressure would spin.
        let mut guard = self.working.len() + 1;
        while self.should_compact() && guard > 0 {
            guard -= 1;
            if !self.try_one_pass().await {
                break;
            }
        }
    }

    /// Tries each strategy in priority order; returns true if one applied
    /// (so the caller should re-evaluate from the top).
    async fn try_one_pass(&mut self) -> bool {
        let plan_hint = self.plan_hint().await;
        let plan_hint = plan_hint.as_deref();
        let mut working = self.working.get();
        let protected_from = working.len().saturating_sub(self.config.last_keep);
        let prompts = &self.config.custom_prompts;

        let outcome = compression::try_tool_invocation_compress(
            &mut working,
            &mut self.offload,
            self.config.min_consecutive_tool_messages,
            protected_from,
            self.summarizer.as_ref(),
            prompts.tool_invocation_compress.as_deref(),
            plan_hint,
        )
        .await;
        if self.finish_pass(outcome, working) {
            return true;
        }

        let mut working = self.working.get();
        let outcome = compression::try_previous_round_large_payload_offload(
            &mut working,
            &mut self.offload,
            self.config.large_payload_threshold,
            protected_from,
        );
        if self.finish_pass(outcome, working) {
            return true;
        }

        let mut working = self.working.get();
        let outcome = compression::try_current_round_large_payload_offload(
            &mut working,
            &mut self.offload,
            self.config.large_payload_threshold,
            protected_from,
        );
        if self.finish_pass(outcome, working) {
            return true;
        }

        let mut working = self.working.get();
        let outcome = compression::try_previous_round_summary(
            &mut working,
            &mut self.offload,
            protected_from,
            self.summarizer.as_ref(),
            prompts.previous_round_summary.as_deref(),
            plan_hint,
        )
        .await;
        if self.finish_pass(outcome, working) {
            return true;
        }

        let mut working = self.working.get();
        let outcome = compression::try_current_round_large_message_summary(
            &mut working,
            &mut self.offload,
            self.config.large_payload_threshold,
            protected_from,
            self.summarizer.as_ref(),
            prompts.current_round_large_message.as_deref(),
            plan_hint,
        )
        .await;
        if self.finish_pass(outcome, working) {
            return true;
        }

        let mut working = self.working.get();
        let outcome = compression::try_current_round_messages_compress(
            &mut working,
            &mut self.offload,
            protected_from,
            self.summarizer.as_ref(),
            prompts.current_round_messages_compress.as_deref(),
            plan_hint,
        )
        .await;
        self.finish_pass(outcome, working)
    }

    /// Applies the outcome of one strategy attempt: on `Applied`, installs
    /// the rewritten working set and records the event, returning `true`
    /// so the caller restarts the pass; on `Failed`, records the event but
    /// leaves the working set untouched; on `NotApplicable`, does nothing.
    fn finish_pass(&mut self, outcome: StrategyOutcome, rewritten: Vec<Message>) -> bool {
        match outcome {
            StrategyOutcome::Applied(event) => {
                log::debug!("auto-context compaction applied {:?}", event.kind);
                self.events.push(event);
                let len = self.working.len();
                if len > 0 {
                    self.working.replace_range(0, len - 1, rewritten);
                } else {
                    self.working.replace_range(0, 0, rewritten);
                }
                true
            }
            StrategyOutcome::Failed(event) => {
                log::warn!("auto-context compaction strategy {:?} failed: {:?}", event.kind, event.metadata.get("error"));
                self.events.push(event);
                false
            }
            StrategyOutcome::NotApplicable => false,
        }
    }
}

/// Extracts the reload handle embedded in a compression summary, if any.
/// Exposed for callers that want to surface reload hints without going
/// through the tool-call loop (e.g. tests, debugging UIs).
pub fn extract_reload_hint(message: &Message) -> Option<Uuid> {
    parse_reload_hint(&message.text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ContentBlock, Message, Role};
    use async_trait::async_trait;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSummarizer {
        calls: AtomicUsize,
    }

    impl CountingSummarizer {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Summarizer for CountingSummarizer {
        async fn summarize(&self, _prompt: &str, span: &[Message]) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("summary of {} messages", span.len()))
        }
    }

    fn tool_pair(name: &str) -> Vec<Message> {
        let mut input = serde_json::Map::new();
        input.insert("q".into(), serde_json::json!("x"));
        vec![
            Message::assistant(vec![ContentBlock::tool_use("tc", name, input)]),
            Message::tool_result("tc", name, vec![ContentBlock::text("ok")]),
        ]
    }

    #[tokio::test]
    async fn scenario_s3_consecutive_tool_messages_trigger_compression() {
        let summarizer = Arc::new(CountingSummarizer::new());
        let mut memory = AutoContextMemory::new(summarizer.clone()).with_config(
            AutoContextConfig::default()
                .with_msg_threshold(10)
                .with_min_consecutive_tool_messages(3)
                .with_last_keep(5)
                .with_max_token(1)
                .with_token_ratio(0.0),
        );

        memory.add_message(Message::user("start"));
        for _ in 0..5 {
            for m in tool_pair("test_tool") {
                memory.add_message(m);
            }
        }
        memory.add_message(Message::assistant(vec![ContentBlock::text("done with tools")]));
        for i in 0..10 {
            memory.add_message(Message::user(format!("follow-up {i}")));
        }

        assert_eq!(memory.original_len(), 22);
        let working = memory.get_messages().await;

        assert!(summarizer.call_count() >= 1);
        assert!(working.len() < 22);
        assert_eq!(memory.original_len(), 22);
    }

    #[tokio::test]
    async fn scenario_s4_previous_round_summary_triggers() {
        let summarizer = Arc::new(CountingSummarizer::new());
        let mut memory = AutoContextMemory::new(summarizer.clone()).with_config(
            AutoContextConfig::default()
                .with_msg_threshold(10)
                .with_min_consecutive_tool_messages(10)
                .with_last_keep(2)
                .with_max_token(1)
                .with_token_ratio(0.0),
        );

        for round in 0..5 {
            memory.add_message(Message::user(format!("question {round}")));
            let mut input = serde_json::Map::new();
            input.insert("q".into(), serde_json::json!(round));
            memory.add_message(Message::assistant(vec![ContentBlock::tool_use("tc", "lookup", input)]));
            memory.add_message(Message::tool_result("tc", "lookup", vec![ContentBlock::text("result")]));
            memory.add_message(Message::assistant(vec![ContentBlock::text(format!("answer {round}"))]));
        }
        memory.add_message(Message::user("final question"));

        let working = memory.get_messages().await;
        assert!(summarizer.call_count() >= 4);
        assert!(working.len() < 21);
    }

    #[tokio::test]
    async fn reload_of_unknown_handle_returns_tool_error_message_not_a_panic() {
        let summarizer = Arc::new(CountingSummarizer::new());
        let memory = AutoContextMemory::new(summarizer);
        let result = memory.reload("uuid:00000000-0000-0000-0000-000000000000");
        assert_eq!(result.role, Role::Tool);
        assert!(result.text().contains("00000000"));
    }

    #[tokio::test]
    async fn get_messages_is_a_pure_noop_below_threshold() {
        let summarizer = Arc::new(CountingSummarizer::new());
        let mut memory = AutoContextMemory::new(summarizer.clone());
        memory.add_message(Message::user("hi"));
        let working = memory.get_messages().await;
        assert_eq!(working.len(), 1);
        assert_eq!(summarizer.call_count(), 0);
    }
}
