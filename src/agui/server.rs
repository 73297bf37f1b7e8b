//! An axum `POST /agui/run[/{agentId}]` SSE endpoint (§6 AG-UI wire
//! surface).
//!
//! Grounded in `mcp_http_adapter.rs`'s axum `Router`/`post` usage,
//! generalized from a JSON request/response MCP adapter into a
//! streaming SSE endpoint built on `axum::response::sse`.

use crate::agent::react_loop::ReactLoop;
use crate::agui::adapter::{AgUiAdapter, AgUiAdapterConfig};
use crate::agui::event::AguiEvent;
use crate::agui::wire::RunAgentInput;
use crate::error::ProtocolError;
use crate::model::ModelOptions;
use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use futures_util::stream::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// Resolves `(agentId, threadId)` to a running agent. Implementations
/// typically look up a pre-configured `ReactLoop` per agent id and decide,
/// from their own session bookkeeping, whether the thread already has
/// server-side memory (§4.5 Agent resolution).
#[async_trait]
pub trait AgentResolver: Send + Sync {
    async fn resolve(&self, agent_id: &str, thread_id: &str) -> Option<Arc<ReactLoop>>;

    /// When true, the server forwards only the latest user message from
    /// the request instead of replaying the whole `messages` array.
    async fn has_server_side_memory(&self, agent_id: &str, thread_id: &str) -> bool;
}

#[derive(Clone)]
pub struct AguiServerState {
    pub resolver: Arc<dyn AgentResolver>,
    pub config: AgUiAdapterConfig,
}

pub fn router(state: AguiServerState) -> Router {
    Router::new()
        .route("/agui/run", post(run_without_path))
        .route("/agui/run/{agent_id}", post(run_with_path))
        .with_state(state)
}

async fn run_without_path(
    State(state): State<AguiServerState>,
    headers: HeaderMap,
    Json(input): Json<RunAgentInput>,
) -> impl IntoResponse {
    handle_run(state, None, headers, input).await
}

async fn run_with_path(
    State(state): State<AguiServerState>,
    Path(agent_id): Path<String>,
    headers: HeaderMap,
    Json(input): Json<RunAgentInput>,
) -> impl IntoResponse {
    handle_run(state, Some(agent_id), headers, input).await
}

/// Agent id resolution priority: URL path > `X-Agent-Id` header > request
/// `forwardedProps.agentId` > `config.defaultAgentId` > `"default"`.
fn resolve_agent_id(path_agent_id: Option<String>, headers: &HeaderMap, input: &RunAgentInput, default_agent_id: &str) -> String {
    if let Some(id) = path_agent_id {
        return id;
    }
    if let Some(header) = headers.get("X-Agent-Id").and_then(|v| v.to_str().ok()) {
        return header.to_string();
    }
    if let Some(id) = input.forwarded_props.as_ref().and_then(|p| p.get("agentId")).and_then(|v| v.as_str()) {
        return id.to_string();
    }
    if !default_agent_id.is_empty() {
        return default_agent_id.to_string();
    }
    "default".to_string()
}

async fn handle_run(
    state: AguiServerState,
    path_agent_id: Option<String>,
    headers: HeaderMap,
    input: RunAgentInput,
) -> axum::response::Response {
    if input.messages.is_empty() {
        let err = ProtocolError::new("RunAgentInput.messages must not be empty");
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": err.to_string()}))).into_response();
    }

    let agent_id = resolve_agent_id(path_agent_id, &headers, &input, &state.config.default_agent_id);
    let Some(react_loop) = state.resolver.resolve(&agent_id, &input.thread_id).await else {
        let err = ProtocolError::new(format!("no agent registered for id `{agent_id}`"));
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": err.to_string()}))).into_response();
    };

    let has_memory = state.resolver.has_server_side_memory(&agent_id, &input.thread_id).await;
    let Some(user_message) = select_forwarded_message(&input, has_memory) else {
        let err = ProtocolError::new("no user message found in RunAgentInput.messages");
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": err.to_string()}))).into_response();
    };

    let adapter = AgUiAdapter::new(input.thread_id.clone(), input.run_id.clone(), state.config.clone());
    let run_timeout = state.config.run_timeout;
    let event_stream = run_as_sse(react_loop, user_message, adapter, run_timeout);
    Sse::new(event_stream).keep_alive(KeepAlive::default()).into_response()
}

/// If the resolver reports existing server-side memory, only the latest
/// user message is forwarded; otherwise the whole request replays.
fn select_forwarded_message(input: &RunAgentInput, has_memory: bool) -> Option<crate::message::Message> {
    if has_memory {
        input.messages.iter().rev().find(|m| m.role == "user").map(|m| m.to_message())
    } else {
        input.messages.first().map(|m| m.to_message())
    }
}

/// Drives the ReAct run to completion in a spawned task, pushing each
/// translated AG-UI event into a channel consumed as the SSE body.
/// `RunStarted` is sent before the task starts and `RunFinished` is
/// always sent last, even if the run errors or times out (§4.5 Lifecycle
/// invariants, §4.5 Cancellation/timeout).
fn run_as_sse(
    react_loop: Arc<ReactLoop>,
    user_message: crate::message::Message,
    mut adapter: AgUiAdapter,
    run_timeout: Option<Duration>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    let (tx, rx) = tokio::sync::mpsc::channel::<AguiEvent>(64);

    tokio::spawn(async move {
        if tx.send(adapter.run_started()).await.is_err() {
            return;
        }

        let mut inner = react_loop.stream(user_message, ModelOptions::default());
        let drive = async {
            while let Some(event) = inner.next().await {
                match event {
                    Ok(agent_event) => {
                        for agui_event in adapter.translate(&agent_event) {
                            if tx.send(agui_event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let raw = adapter.translate_error(&e);
                        let _ = tx.send(raw).await;
                        break;
                    }
                }
            }
        };

        match run_timeout {
            Some(timeout) => {
                if tokio::time::timeout(timeout, drive).await.is_err() {
                    let timeout_err = crate::error::AgentCoreError::Timeout(crate::error::TimeoutError);
                    let raw = adapter.translate_error(&timeout_err);
                    let _ = tx.send(raw).await;
                }
            }
            None => drive.await,
        }

        let _ = tx.send(adapter.run_finished()).await;
    });

    tokio_stream::wrappers::ReceiverStream::new(rx).map(|event| to_sse(&event))
}

fn to_sse(event: &AguiEvent) -> Result<Event, std::convert::Infallible> {
    Ok(Event::default().json_data(event).unwrap_or_else(|_| Event::default().data("{}")))
}
