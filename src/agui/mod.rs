//! The AG-UI protocol adapter (C5): translates the ReAct loop's internal
//! event stream into an external, protocol-conformant SSE stream.

pub mod adapter;
pub mod event;
pub mod server;
pub mod wire;

pub use adapter::{AgUiAdapter, AgUiAdapterConfig, ToolMergeMode};
pub use event::AguiEvent;
pub use server::{router, AgentResolver, AguiServerState};
pub use wire::{AguiMessage, RunAgentInput};
