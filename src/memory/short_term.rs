//! Short-term memory (C2): the ordered mutable log underneath the working
//! set. Grounded in `llm_session.rs`'s `conversation_history: Vec<Message>`
//! bookkeeping, generalized to the exact operation set §3/§4.1 specify.

use crate::error::MemoryError;
use crate::message::Message;

/// An ordered, mutable log of messages. Not internally synchronized —
/// callers serialize their own access, same as the teacher's
/// `LLMSession`, which assumes single-writer use.
#[derive(Debug, Clone, Default)]
pub struct ShortTermMemory {
    messages: Vec<Message>,
}

impl ShortTermMemory {
    pub fn new() -> Self {
        Self { messages: Vec::new() }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn append_all(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// A snapshot clone of the current log. Indices into the returned
    /// vector are stable for the lifetime of that snapshot even if the log
    /// mutates afterward.
    pub fn get(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Replaces the inclusive range `[start, end_inclusive]` with `new`.
    /// Per the spec's Open Questions, an out-of-bounds `end_inclusive` is
    /// clamped to the last valid index rather than rejected; `start >
    /// end_inclusive` (after clamping) or a `start` past the end of the log
    /// is a silent no-op.
    pub fn replace_range(&mut self, start: usize, end_inclusive: usize, new: Vec<Message>) {
        if self.messages.is_empty() || start >= self.messages.len() {
            return;
        }
        let end = end_inclusive.min(self.messages.len() - 1);
        if start > end {
            return;
        }
        self.messages.splice(start..=end, new);
    }

    /// Removes the message at `index`. Unlike `replace_range`, an
    /// out-of-range index is an error, not a no-op (§4.1).
    pub fn delete_at(&mut self, index: usize) -> Result<Message, MemoryError> {
        if index >= self.messages.len() {
            return Err(MemoryError::new(format!(
                "index {index} out of range for log of length {}",
                self.messages.len()
            )));
        }
        Ok(self.messages.remove(index))
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn log_of(n: usize) -> ShortTermMemory {
        let mut m = ShortTermMemory::new();
        for i in 0..n {
            m.append(Message::user(format!("msg-{i}")));
        }
        m
    }

    #[test]
    fn replace_range_with_start_greater_than_end_is_noop() {
        let mut m = log_of(5);
        m.replace_range(3, 1, vec![Message::user("x")]);
        assert_eq!(m.len(), 5);
    }

    #[test]
    fn replace_range_clamps_out_of_bounds_end() {
        let mut m = log_of(3);
        m.replace_range(1, 100, vec![Message::user("replacement")]);
        let snapshot = m.get();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1].text(), "replacement");
    }

    #[test]
    fn replace_range_on_empty_log_is_noop() {
        let mut m = ShortTermMemory::new();
        m.replace_range(0, 0, vec![Message::user("x")]);
        assert_eq!(m.len(), 0);
    }

    #[test]
    fn delete_at_out_of_range_errors() {
        let mut m = log_of(2);
        assert!(m.delete_at(5).is_err());
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn delete_at_in_range_removes_message() {
        let mut m = log_of(3);
        let removed = m.delete_at(1).unwrap();
        assert_eq!(removed.text(), "msg-1");
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn clear_empties_the_log() {
        let mut m = log_of(4);
        m.clear();
        assert!(m.is_empty());
    }
}
