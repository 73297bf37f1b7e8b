//! The ReAct agent loop and its supporting types (C4).

pub mod event;
pub mod react_loop;
pub mod tool;

pub use event::{AgentEvent, AgentObserver, EventStream, EventType};
pub use react_loop::{ReactLoop, ReactLoopOptions};
pub use tool::{Tool, ToolRegistry, ToolSpec};
