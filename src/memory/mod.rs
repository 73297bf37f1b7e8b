//! Short-term conversation storage and auto-context compaction (C2/C3).

pub mod auto_context;
pub mod compression;
pub mod offload;
pub mod short_term;
pub mod token_count;

pub use auto_context::{AutoContextConfig, AutoContextMemory};
pub use compression::{CompressionEvent, CompressionKind, Summarizer};
pub use offload::OffloadTable;
pub use short_term::ShortTermMemory;
