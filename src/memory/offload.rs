//! The offload table: opaque-handle storage for message spans removed from
//! the working set during compression.
//!
//! Grounded in the teacher's opaque-id idiom (`uuid::Uuid` turn ids in
//! `planner.rs`); kept deliberately in-memory-only per §9 Design Notes
//! ("Offload storage durability").

use crate::error::OffloadError;
use crate::message::Message;
use std::collections::HashMap;
use uuid::Uuid;

/// Maps an opaque handle to the ordered run of messages it replaced in the
/// working set.
#[derive(Debug, Clone, Default)]
pub struct OffloadTable {
    entries: HashMap<Uuid, Vec<Message>>,
}

impl OffloadTable {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Stores `messages` under a freshly generated handle and returns it.
    pub fn offload(&mut self, messages: Vec<Message>) -> Uuid {
        let handle = Uuid::new_v4();
        self.entries.insert(handle, messages);
        handle
    }

    /// Returns the messages stored under `handle`, or `[]` if unknown.
    /// The spec's `reload(handle) → msgs | []` contract; callers that need
    /// the distinct-from-empty-offload case use `try_reload`.
    pub fn reload(&self, handle: &Uuid) -> Vec<Message> {
        self.entries.get(handle).cloned().unwrap_or_default()
    }

    /// Returns `Err(OffloadError)` for a handle never stored (or already
    /// cleared) instead of silently returning an empty vec. Used by the
    /// reload tool, which must surface a tool-style error message rather
    /// than treating "never offloaded" the same as "offloaded nothing".
    pub fn try_reload(&self, handle: &Uuid) -> Result<Vec<Message>, OffloadError> {
        self.entries.get(handle).cloned().ok_or_else(|| OffloadError::new(handle.to_string()))
    }

    pub fn clear(&mut self, handle: &Uuid) {
        self.entries.remove(handle);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parses a reload hint of the form `uuid:<handle>` embedded in a
/// compression summary, tolerating surrounding text.
pub fn parse_reload_hint(text: &str) -> Option<Uuid> {
    text.split_whitespace().find_map(|token| {
        let token = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != ':');
        token.strip_prefix("uuid:").and_then(|rest| Uuid::parse_str(rest).ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn reload_of_unknown_handle_is_empty() {
        let table = OffloadTable::new();
        assert!(table.reload(&Uuid::new_v4()).is_empty());
    }

    #[test]
    fn try_reload_of_unknown_handle_errors() {
        let table = OffloadTable::new();
        assert!(table.try_reload(&Uuid::new_v4()).is_err());
    }

    #[test]
    fn offload_then_reload_returns_the_originals() {
        let mut table = OffloadTable::new();
        let originals = vec![Message::user("a"), Message::user("b")];
        let handle = table.offload(originals.clone());
        assert_eq!(table.reload(&handle), originals);
    }

    #[test]
    fn clear_removes_the_entry() {
        let mut table = OffloadTable::new();
        let handle = table.offload(vec![Message::user("a")]);
        table.clear(&handle);
        assert!(table.reload(&handle).is_empty());
    }

    #[test]
    fn parse_reload_hint_extracts_embedded_uuid() {
        let handle = Uuid::new_v4();
        let text = format!("Summary of tool calls. Reload with uuid:{handle} if needed.");
        assert_eq!(parse_reload_hint(&text), Some(handle));
    }

    #[test]
    fn parse_reload_hint_returns_none_without_a_hint() {
        assert_eq!(parse_reload_hint("no hint here"), None);
    }
}
