//! Long-term memory (§6, optional external collaborator).
//!
//! Modeled after the same attached-trait-object boundary the teacher uses
//! for `thought_chain: Option<Arc<RwLock<ThoughtChain>>>` — the core owns
//! no persistence, only the hook.

use crate::message::Message;
use async_trait::async_trait;
use std::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LtmMode {
    /// The loop itself retrieves before step 1 of each iteration.
    StaticControl,
    /// Retrieval is exposed as a tool the model calls at its own
    /// discretion.
    AgentControl,
}

#[async_trait]
pub trait LongTermMemory: Send + Sync {
    async fn record(&self, messages: &[Message]) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn retrieve(&self, query: &str) -> Result<Vec<Message>, Box<dyn Error + Send + Sync>>;
}
