//! The ReAct agent loop (C4, §4.3).
//!
//! Grounded in `agent.rs`'s `Agent` (builder methods, `Arc<RwLock<_>>`
//! shared state so the same instance can be driven from a spawned task)
//! and `event.rs`'s `AgentEvent`/`EventHandler` split, generalized from a
//! single flat tool-call-detection loop into the spec's content-block
//! routing with a first-class, cancellable event stream. The
//! mpsc-channel-plus-cancellation-token streaming idiom is learned from
//! `hi-youichi-loom` (see DESIGN.md), since the teacher has no streaming
//! cancellation primitive of its own.

use crate::agent::event::{AgentEvent, AgentObserver, EventStream};
use crate::agent::tool::{Tool, ToolRegistry, ToolSpec};
use crate::error::{AgentCoreError, CancellationError, ToolError};
use crate::knowledge::{Knowledge, KnowledgeConfig, RagMode};
use crate::ltm::{LongTermMemory, LtmMode};
use crate::memory::auto_context::{AutoContextMemory, RELOAD_MEMORY_TOOL_NAME};
use crate::message::{ContentBlock, Message, Role, ToolUseBlock};
use crate::model::{ChatResponse, Model, ModelOptions};
use crate::plan::Plan;
use async_trait::async_trait;
use futures_util::{future, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ReactLoopOptions {
    pub max_iters: usize,
    /// Event channel capacity; bounds how far the model/tool producer can
    /// run ahead of a slow consumer (§5 back-pressure).
    pub channel_capacity: usize,
}

impl Default for ReactLoopOptions {
    fn default() -> Self {
        Self { max_iters: 10, channel_capacity: 32 }
    }
}

/// A tool that surfaces `Knowledge::retrieve` to the model, registered
/// automatically when `with_knowledge` is configured with `RagMode::Agentic`.
struct RetrieveKnowledgeTool {
    knowledge: Arc<dyn Knowledge>,
    config: KnowledgeConfig,
}

#[async_trait]
impl Tool for RetrieveKnowledgeTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "retrieve_knowledge",
            "Retrieve ranked documents relevant to a query from the knowledge base.",
            serde_json::json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        )
    }

    async fn invoke(&self, input: serde_json::Map<String, serde_json::Value>) -> Result<Vec<ContentBlock>, ToolError> {
        let query = input.get("query").and_then(|v| v.as_str()).unwrap_or_default();
        let docs = self
            .knowledge
            .retrieve(query, &self.config)
            .await
            .map_err(|e| ToolError::new("retrieve_knowledge", e.to_string()))?;
        let rendered = docs.iter().map(|d| format!("(score={:.3}) {}", d.score, d.content)).collect::<Vec<_>>().join("\n\n");
        Ok(vec![ContentBlock::text(rendered)])
    }
}

/// Exposes `LongTermMemory::retrieve` as a tool, registered when
/// `with_long_term_memory` is configured with `LtmMode::AgentControl`.
struct RetrieveLongTermMemoryTool {
    ltm: Arc<dyn LongTermMemory>,
}

#[async_trait]
impl Tool for RetrieveLongTermMemoryTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "retrieve_memory",
            "Retrieve relevant long-term memories for a query.",
            serde_json::json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        )
    }

    async fn invoke(&self, input: serde_json::Map<String, serde_json::Value>) -> Result<Vec<ContentBlock>, ToolError> {
        let query = input.get("query").and_then(|v| v.as_str()).unwrap_or_default();
        let messages = self.ltm.retrieve(query).await.map_err(|e| ToolError::new("retrieve_memory", e.to_string()))?;
        let rendered = messages.iter().map(|m| m.text()).collect::<Vec<_>>().join("\n");
        Ok(vec![ContentBlock::text(rendered)])
    }
}

/// Reloads a span previously offloaded by the auto-context memory,
/// exposed as a tool so the model can act on reload hints embedded in
/// compression summaries (§4.2 Offload/reload contract).
struct ReloadMemoryTool {
    memory: Arc<Mutex<AutoContextMemory>>,
}

#[async_trait]
impl Tool for ReloadMemoryTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            RELOAD_MEMORY_TOOL_NAME,
            "Reload a previously offloaded span of messages by its uuid handle.",
            serde_json::json!({
                "type": "object",
                "properties": {"handle": {"type": "string"}},
                "required": ["handle"]
            }),
        )
    }

    async fn invoke(&self, input: serde_json::Map<String, serde_json::Value>) -> Result<Vec<ContentBlock>, ToolError> {
        let handle = input.get("handle").and_then(|v| v.as_str()).ok_or_else(|| ToolError::new(RELOAD_MEMORY_TOOL_NAME, "missing `handle`"))?;
        let memory = self.memory.lock().await;
        Ok(memory.reload(handle).content)
    }
}

/// Orchestrates reasoning → tool execution → observation rounds and emits
/// a cancellable, cold, single-subscriber stream of [`AgentEvent`]s.
///
/// Cheap to clone: every field is an `Arc`, so the same `ReactLoop` handle
/// can be captured by the task `stream()` spawns.
#[derive(Clone)]
pub struct ReactLoop {
    model: Arc<dyn Model>,
    memory: Arc<Mutex<AutoContextMemory>>,
    tools: Arc<StdMutex<ToolRegistry>>,
    options: ReactLoopOptions,
    plan: Option<Arc<RwLock<Plan>>>,
    ltm: Option<(Arc<dyn LongTermMemory>, LtmMode)>,
    knowledge: Option<(Arc<dyn Knowledge>, RagMode)>,
    observer: Option<Arc<dyn AgentObserver>>,
}

impl ReactLoop {
    pub fn new(model: Arc<dyn Model>, memory: AutoContextMemory) -> Self {
        let memory = Arc::new(Mutex::new(memory));
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(ReloadMemoryTool { memory: memory.clone() }));
        Self {
            model,
            memory,
            tools: Arc::new(StdMutex::new(tools)),
            options: ReactLoopOptions::default(),
            plan: None,
            ltm: None,
            knowledge: None,
            observer: None,
        }
    }

    pub fn with_tools(self, tools: ToolRegistry) -> Self {
        {
            let mut guard = self.tools.lock().unwrap();
            for spec in tools.list_specs() {
                if let Some(tool) = tools.get(&spec.name) {
                    guard.register(tool);
                }
            }
        }
        self
    }

    pub fn with_options(mut self, options: ReactLoopOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn AgentObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_long_term_memory(mut self, ltm: Arc<dyn LongTermMemory>, mode: LtmMode) -> Self {
        if mode == LtmMode::AgentControl {
            self.tools.lock().unwrap().register(Arc::new(RetrieveLongTermMemoryTool { ltm: ltm.clone() }));
        }
        self.ltm = Some((ltm, mode));
        self
    }

    pub fn with_knowledge(mut self, kb: Arc<dyn Knowledge>, mode: RagMode, config: KnowledgeConfig) -> Self {
        if mode == RagMode::Agentic {
            self.tools.lock().unwrap().register(Arc::new(RetrieveKnowledgeTool { knowledge: kb.clone(), config }));
        }
        self.knowledge = Some((kb, mode));
        self
    }

    /// Attaches a fresh plan notebook to the loop's memory and registers
    /// the built-in plan toolkit (`create_plan`, `advance_subtask`,
    /// `finish_plan`).
    pub async fn enable_plan(self) -> Self {
        let notebook = Arc::new(RwLock::new(Plan::new("untitled", "", "")));
        {
            let mut mem = self.memory.lock().await;
            mem.attach_plan(notebook.clone());
        }
        {
            let mut guard = self.tools.lock().unwrap();
            guard.register(Arc::new(crate::plan::CreatePlanTool::new(notebook.clone())));
            guard.register(Arc::new(crate::plan::AdvanceSubtaskTool::new(notebook.clone())));
            guard.register(Arc::new(crate::plan::FinishPlanTool::new(notebook.clone())));
        }
        let mut this = self;
        this.plan = Some(notebook);
        this
    }

    /// Convenience: runs `stream` to completion and returns the terminal
    /// assistant message.
    pub async fn call(&self, user_msg: Message) -> Result<Message, AgentCoreError> {
        let mut stream = self.stream(user_msg, ModelOptions::default());
        let mut last_assistant: Option<Message> = None;
        while let Some(event) = stream.next().await {
            let event = event?;
            if event.message.role == Role::Assistant {
                last_assistant = Some(event.message);
            }
        }
        last_assistant.ok_or_else(|| AgentCoreError::Model(crate::error::ModelError::new("model produced no assistant message")))
    }

    /// Finite, not-restartable, cancellable event stream for one run.
    /// Dropping the returned stream cancels the in-flight model call and
    /// stops dispatching further tool invocations (§4.3 Cancellation).
    pub fn stream(&self, user_msg: Message, model_options: ModelOptions) -> EventStream {
        let (tx, rx) = mpsc::channel(self.options.channel_capacity);
        let token = CancellationToken::new();
        let task_token = token.clone();
        let this = self.clone();
        tokio::spawn(async move {
            this.run(user_msg, model_options, tx, task_token).await;
        });
        Box::pin(CancelOnDrop { inner: ReceiverStream::new(rx), token })
    }

    async fn run(
        &self,
        user_msg: Message,
        model_options: ModelOptions,
        tx: mpsc::Sender<Result<AgentEvent, AgentCoreError>>,
        cancel: CancellationToken,
    ) {
        let query_text = user_msg.text();
        {
            let mut mem = self.memory.lock().await;
            mem.add_message(user_msg);
        }

        if let Some((kb, RagMode::Generic)) = &self.knowledge {
            match kb.retrieve(&query_text, &KnowledgeConfig::default()).await {
                Ok(docs) if !docs.is_empty() => {
                    let rendered = docs.iter().map(|d| d.content.clone()).collect::<Vec<_>>().join("\n\n");
                    let mut mem = self.memory.lock().await;
                    mem.add_message(Message::system(format!("Relevant context:\n{rendered}")));
                }
                Ok(_) => {}
                Err(e) => log::warn!("knowledge retrieval failed: {e}"),
            }
        }

        let mut iter = 0usize;
        loop {
            if cancel.is_cancelled() {
                let _ = tx.send(Err(AgentCoreError::Cancellation(CancellationError))).await;
                return;
            }

            let mut messages = {
                let mut mem = self.memory.lock().await;
                mem.get_messages().await
            };

            if let Some((ltm, LtmMode::StaticControl)) = &self.ltm {
                match ltm.retrieve(&query_text).await {
                    Ok(retrieved) if !retrieved.is_empty() => {
                        let mut prefixed = retrieved;
                        prefixed.extend(messages);
                        messages = prefixed;
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("long-term memory retrieval failed: {e}"),
                }
            }

            let tool_specs = { self.tools.lock().unwrap().list_specs() };

            let model_stream = match self.model.stream(&messages, &tool_specs, &model_options).await {
                Ok(s) => s,
                Err(e) => {
                    let _ = tx.send(Err(AgentCoreError::Model(e))).await;
                    return;
                }
            };

            let turn_id = uuid::Uuid::new_v4().to_string();
            let mut assembled: Vec<ContentBlock> = Vec::new();
            let mut model_stream = model_stream;
            loop {
                if cancel.is_cancelled() {
                    let _ = tx.send(Err(AgentCoreError::Cancellation(CancellationError))).await;
                    return;
                }
                match model_stream.next().await {
                    None => break,
                    Some(Err(e)) => {
                        let _ = tx.send(Err(AgentCoreError::Model(e))).await;
                        return;
                    }
                    Some(Ok(chunk)) => {
                        assembled.extend(chunk.content.clone());
                        let chunk_message = Message::assistant(chunk.content).with_id(turn_id.clone());
                        let event = AgentEvent::reasoning(chunk_message, false);
                        self.notify(&event).await;
                        if tx.send(Ok(event)).await.is_err() {
                            return;
                        }
                    }
                }
            }

            let final_message = Message::assistant(assembled).with_id(turn_id.clone());
            let final_event = AgentEvent::reasoning(final_message.clone(), true);
            self.notify(&final_event).await;
            if tx.send(Ok(final_event)).await.is_err() {
                return;
            }

            {
                let mut mem = self.memory.lock().await;
                mem.add_message(final_message.clone());
            }

            let tool_uses: Vec<ToolUseBlock> = final_message.tool_uses().into_iter().cloned().collect();
            if tool_uses.is_empty() {
                let finish_event = AgentEvent::finish(final_message);
                self.notify(&finish_event).await;
                let _ = tx.send(Ok(finish_event)).await;
                return;
            }

            let registry = { self.tools.lock().unwrap().clone() };
            let all_parallel_safe = tool_uses
                .iter()
                .all(|call| registry.get(&call.name).map(|t| t.spec().parallel_safe).unwrap_or(false));

            let results: Vec<Message> = if all_parallel_safe {
                future::join_all(tool_uses.iter().map(|call| registry.execute(call))).await
            } else {
                let mut out = Vec::with_capacity(tool_uses.len());
                for call in &tool_uses {
                    out.push(registry.execute(call).await);
                }
                out
            };

            for result_message in results {
                let tool_event = AgentEvent::tool_result(result_message.clone());
                self.notify(&tool_event).await;
                {
                    let mut mem = self.memory.lock().await;
                    mem.add_message(result_message);
                }
                if tx.send(Ok(tool_event)).await.is_err() {
                    return;
                }
            }

            iter += 1;
            if iter >= self.options.max_iters {
                let mut meta = HashMap::new();
                meta.insert("truncated".to_string(), serde_json::json!(true));
                let last_messages = { self.memory.lock().await.get_messages().await };
                let truncated = last_messages
                    .into_iter()
                    .rev()
                    .find(|m| m.role == Role::Assistant)
                    .unwrap_or_else(|| Message::assistant(vec![]))
                    .with_metadata(meta);
                let finish_event = AgentEvent::finish(truncated);
                self.notify(&finish_event).await;
                let _ = tx.send(Ok(finish_event)).await;
                return;
            }
        }
    }

    async fn notify(&self, event: &AgentEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(event).await;
        }
    }
}

/// Wraps the channel-backed stream so dropping the consumer's handle
/// cancels the producing task cooperatively (checked at each suspension
/// point in `run`), per §4.3/§5 Cancellation.
struct CancelOnDrop {
    inner: ReceiverStream<Result<AgentEvent, AgentCoreError>>,
    token: CancellationToken,
}

impl futures_util::stream::Stream for CancelOnDrop {
    type Item = Result<AgentEvent, AgentCoreError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_next(cx)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// A ChatResponse-producing `Model` stub used only by this crate's own
/// tests (kept here instead of `tests/` so it can be reused by both the
/// unit tests below and `tests/react_loop_tests.rs`).
#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::error::ModelError;
    use crate::model::{ChatResponse, ChatResponseStream, Usage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct ScriptedModel {
        turns: Vec<Vec<ChatResponse>>,
        call_count: AtomicUsize,
    }

    impl ScriptedModel {
        pub fn new(turns: Vec<Vec<ChatResponse>>) -> Self {
            Self { turns, call_count: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        async fn stream(
            &self,
            _messages: &[Message],
            _tools: &[ToolSpec],
            _options: &ModelOptions,
        ) -> Result<ChatResponseStream, ModelError> {
            let turn_index = self.call_count.fetch_add(1, Ordering::SeqCst);
            let chunks = self.turns.get(turn_index).cloned().unwrap_or_default();
            Ok(Box::pin(futures_util::stream::iter(chunks.into_iter().map(Ok))))
        }

        fn model_name(&self) -> &str {
            "scripted-test-model"
        }
    }

    pub fn chunk(content: Vec<ContentBlock>) -> ChatResponse {
        ChatResponse { id: uuid::Uuid::new_v4().to_string(), content, usage: Usage::default() }
    }

    pub struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn spec(&self) -> ToolSpec {
            ToolSpec::new("get_weather", "returns a canned weather reading", serde_json::json!({"type": "object"}))
        }

        async fn invoke(&self, _input: serde_json::Map<String, serde_json::Value>) -> Result<Vec<ContentBlock>, ToolError> {
            Ok(vec![ContentBlock::text("sunny, 25\u{00b0}C")])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::memory::compression::Summarizer;
    use std::error::Error;

    struct NeverCalledSummarizer;

    #[async_trait]
    impl Summarizer for NeverCalledSummarizer {
        async fn summarize(&self, _prompt: &str, _span: &[Message]) -> Result<String, Box<dyn Error + Send + Sync>> {
            unreachable!("compression should not trigger in these small single-turn tests")
        }
    }

    fn small_memory() -> AutoContextMemory {
        AutoContextMemory::new(Arc::new(NeverCalledSummarizer))
    }

    #[tokio::test]
    async fn scenario_s1_single_turn_text_reaches_finish() {
        let model = Arc::new(ScriptedModel::new(vec![vec![chunk(vec![ContentBlock::text("Hi")])]]));
        let react = ReactLoop::new(model, small_memory());
        let answer = react.call(Message::user("Hello")).await.unwrap();
        assert_eq!(answer.text(), "Hi");
    }

    #[tokio::test]
    async fn scenario_s2_tool_round_trip_produces_final_text() {
        let mut input = serde_json::Map::new();
        input.insert("city".to_string(), serde_json::json!("Beijing"));
        let first_turn = vec![chunk(vec![ContentBlock::tool_use("tc-1", "get_weather", input)])];
        let second_turn = vec![chunk(vec![ContentBlock::text("It is sunny, 25\u{00b0}C in Beijing.")])];
        let model = Arc::new(ScriptedModel::new(vec![first_turn, second_turn]));

        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(EchoTool));

        let react = ReactLoop::new(model, small_memory()).with_tools(tools);
        let answer = react.call(Message::user("weather in Beijing")).await.unwrap();
        assert!(answer.text().contains("sunny"));
    }

    #[tokio::test]
    async fn truncates_after_max_iters_when_model_never_stops_calling_tools() {
        let mut input = serde_json::Map::new();
        input.insert("city".to_string(), serde_json::json!("Beijing"));
        let looping_turn = vec![chunk(vec![ContentBlock::tool_use("tc-x", "get_weather", input)])];
        let model = Arc::new(ScriptedModel::new(vec![looping_turn.clone(), looping_turn.clone(), looping_turn]));

        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(EchoTool));

        let react = ReactLoop::new(model, small_memory())
            .with_tools(tools)
            .with_options(ReactLoopOptions { max_iters: 2, channel_capacity: 32 });

        let mut stream = react.stream(Message::user("loop forever"), ModelOptions::default());
        let mut saw_finish = false;
        while let Some(event) = stream.next().await {
            let event = event.unwrap();
            if event.event_type == crate::agent::event::EventType::Finish {
                saw_finish = true;
                assert_eq!(event.message.metadata.as_ref().and_then(|m| m.get("truncated")), Some(&serde_json::json!(true)));
            }
        }
        assert!(saw_finish);
    }
}
