//! Core runtime for multi-agent orchestration: a ReAct agent loop with
//! pluggable tools, an auto-context memory that keeps the working set
//! within a token budget via lazy compaction, and an AG-UI protocol
//! adapter for streaming runs to an external frontend.

pub mod agent;
pub mod agui;
pub mod error;
pub mod formatter;
pub mod knowledge;
pub mod ltm;
pub mod memory;
pub mod message;
pub mod model;
pub mod plan;
pub mod session_store;
pub mod tools;

pub use agent::{AgentEvent, AgentObserver, EventStream, EventType, ReactLoop, ReactLoopOptions, Tool, ToolRegistry, ToolSpec};
pub use error::AgentCoreError;
pub use memory::{AutoContextConfig, AutoContextMemory};
pub use message::{ContentBlock, Message, Role};
pub use model::{Model, ModelOptions};
pub use plan::Plan;
