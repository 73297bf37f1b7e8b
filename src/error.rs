//! Error kinds for the agent core.
//!
//! The teacher favors `Box<dyn Error + Send + Sync>` for pluggable external
//! collaborators (model clients, tool protocols) and keeps that at the
//! outermost boundary here too. Internally, operations that callers need to
//! match on by kind return one of the concrete variants below.

use thiserror::Error;

/// Top-level error type returned by the core's own operations.
///
/// External collaborators (models, tools, long-term memory, knowledge
/// bases) report failures as `Box<dyn std::error::Error + Send + Sync>`,
/// the same as the teacher's `ClientWrapper`/`ToolProtocol` traits; this
/// enum is what the core itself raises and matches on.
#[derive(Debug, Error)]
pub enum AgentCoreError {
    /// Invalid configuration at construction time. Fatal to the instance
    /// that raised it.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The model call failed. Terminates the run.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// A tool invocation failed. Recovered inline as a ToolResultBlock;
    /// this variant only surfaces when a caller bypasses that recovery.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// Compression failed during `getMessages`. The strategy is skipped
    /// and the loop continues; this variant is recorded in the
    /// `CompressionEvent` metadata rather than propagated.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    /// A reload referenced a handle the offload table does not hold.
    #[error("offload error: {0}")]
    Offload(#[from] OffloadError),

    /// A malformed external (AG-UI) request.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The run's event stream was disposed before completion.
    #[error("cancelled: {0}")]
    Cancellation(#[from] CancellationError),

    /// The run exceeded its configured wall-clock budget.
    #[error("timed out: {0}")]
    Timeout(#[from] TimeoutError),
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// The model failed to produce a response.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ModelError {
    pub message: String,
}

impl ModelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A tool invocation raised an error. Carries the originating tool name so
/// the loop can attribute the failure in the resulting ToolResultBlock.
#[derive(Debug, Error)]
#[error("tool `{tool_name}` failed: {message}")]
pub struct ToolError {
    pub tool_name: String,
    pub message: String,
}

impl ToolError {
    pub fn new(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { tool_name: tool_name.into(), message: message.into() }
    }
}

/// A compression strategy failed mid-pass (e.g. the summarizer errored).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct MemoryError {
    pub message: String,
}

impl MemoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Reload was asked for a handle the offload table never stored (or which
/// was already cleared).
#[derive(Debug, Error)]
#[error("no offloaded messages under handle {handle}")]
pub struct OffloadError {
    pub handle: String,
}

impl OffloadError {
    pub fn new(handle: impl Into<String>) -> Self {
        Self { handle: handle.into() }
    }
}

/// A malformed `RunAgentInput` or header combination at the AG-UI HTTP
/// boundary.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProtocolError {
    pub message: String,
}

impl ProtocolError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// The run's event stream was disposed by its consumer.
#[derive(Debug, Error)]
#[error("run cancelled")]
pub struct CancellationError;

/// The run exceeded `AgUiAdapterConfig::run_timeout`.
#[derive(Debug, Error)]
#[error("run exceeded timeout")]
pub struct TimeoutError;
