//! Knowledge base (§6, optional external collaborator) — the RAG
//! retrieval source for the `GENERIC` and `AGENTIC` modes in §4.3.

use async_trait::async_trait;
use std::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RagMode {
    /// Retrieval happens before step 1 of every iteration and is prepended
    /// as a system-role context message.
    Generic,
    /// Retrieval is exposed as the `retrieve_knowledge` tool; the model
    /// decides when to call it.
    Agentic,
}

#[derive(Debug, Clone)]
pub struct KnowledgeConfig {
    pub limit: usize,
    pub score_threshold: f64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self { limit: 5, score_threshold: 0.0 }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievedDoc {
    pub content: String,
    pub score: f64,
}

#[async_trait]
pub trait Knowledge: Send + Sync {
    async fn add_documents(&self, docs: Vec<String>) -> Result<(), Box<dyn Error + Send + Sync>>;

    async fn retrieve(&self, query: &str, config: &KnowledgeConfig) -> Result<Vec<RetrievedDoc>, Box<dyn Error + Send + Sync>>;
}
