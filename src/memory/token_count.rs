//! Heuristic token & character counting for the auto-context memory.
//!
//! Seeded from `llm_session.rs`'s `count_message_tokens` (a `len/4`
//! estimate), extended to the richer per-content-block heuristic §4.2
//! describes. Per the spec's Open Questions this heuristic is *not* a
//! public contract — only monotonicity and the empty-message floor are
//! guaranteed, and both are exercised by the tests below.

use crate::message::{ContentBlock, Message};

const MESSAGE_OVERHEAD: f64 = 4.0;
const ROLE_TOKEN: f64 = 1.0;
const NAME_TOKEN: f64 = 1.0;
const TOOL_USE_OVERHEAD: f64 = 3.0;
const TOOL_RESULT_OVERHEAD: f64 = 3.0;
const IMAGE_OVERHEAD: f64 = 85.0;

fn text_tokens(len: usize) -> f64 {
    (len as f64 / 2.5).ceil()
}

fn thinking_tokens(len: usize) -> f64 {
    (len as f64 / 3.0).ceil()
}

fn content_block_tokens(block: &ContentBlock) -> f64 {
    match block {
        ContentBlock::Text(t) => text_tokens(t.text.len()),
        ContentBlock::Thinking(t) => thinking_tokens(t.thinking.len()),
        ContentBlock::ToolUse(tu) => {
            let input_json = serde_json::to_string(&tu.input).unwrap_or_default();
            TOOL_USE_OVERHEAD + text_tokens(tu.name.len()) + text_tokens(tu.id.len()) + text_tokens(input_json.len())
        }
        ContentBlock::ToolResult(tr) => {
            TOOL_RESULT_OVERHEAD + tr.output.iter().map(content_block_tokens).sum::<f64>()
        }
        ContentBlock::Image(_) => IMAGE_OVERHEAD,
    }
}

/// Estimated token count for one message. Always `>= MESSAGE_OVERHEAD`
/// even for a message with no content blocks.
pub fn count_message_tokens(message: &Message) -> usize {
    let mut total = MESSAGE_OVERHEAD + ROLE_TOKEN;
    if message.name.is_some() {
        total += NAME_TOKEN;
    }
    total += message.content.iter().map(content_block_tokens).sum::<f64>();
    total.ceil() as usize
}

/// Estimated token count across a whole working set.
pub fn count_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(count_message_tokens).sum()
}

/// Character count of a single message's content, used by the
/// large-payload strategies to decide whether a message is oversized.
/// `calculateMessageCharCount(msg-with-empty-text) = 0`.
pub fn calculate_message_char_count(message: &Message) -> usize {
    message
        .content
        .iter()
        .map(content_block_char_count)
        .sum()
}

fn content_block_char_count(block: &ContentBlock) -> usize {
    match block {
        ContentBlock::Text(t) => t.text.len(),
        ContentBlock::Thinking(t) => t.thinking.len(),
        ContentBlock::ToolUse(tu) => {
            serde_json::to_string(&tu.input).map(|s| s.len()).unwrap_or(0) + tu.name.len()
        }
        ContentBlock::ToolResult(tr) => tr.output.iter().map(content_block_char_count).sum(),
        ContentBlock::Image(src) => match &src.source {
            crate::message::ImageSource::Base64 { data, .. } => data.len(),
            crate::message::ImageSource::Url { url } => url.len(),
        },
    }
}

/// `calculateMessagesCharCount(empty) = 0`.
pub fn calculate_messages_char_count(messages: &[Message]) -> usize {
    messages.iter().map(calculate_message_char_count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ContentBlock, Message};

    #[test]
    fn empty_messages_char_count_is_zero() {
        assert_eq!(calculate_messages_char_count(&[]), 0);
    }

    #[test]
    fn message_with_empty_text_char_count_is_zero() {
        let m = Message::assistant(vec![ContentBlock::text("")]);
        assert_eq!(calculate_message_char_count(&m), 0);
    }

    #[test]
    fn token_count_is_monotonic_in_content_length() {
        let short = Message::user("hi");
        let long = Message::user("hi, this is a much longer message with more content");
        assert!(count_message_tokens(&long) >= count_message_tokens(&short));
    }

    #[test]
    fn empty_message_still_costs_overhead() {
        let m = Message::new(crate::message::Role::User, vec![]);
        assert!(count_message_tokens(&m) >= MESSAGE_OVERHEAD as usize);
    }

    #[test]
    fn adding_a_block_never_decreases_the_count() {
        let base = Message::assistant(vec![ContentBlock::text("abc")]);
        let mut extended_content = base.content.clone();
        extended_content.push(ContentBlock::text("more"));
        let extended = Message::assistant(extended_content);
        assert!(count_message_tokens(&extended) >= count_message_tokens(&base));
    }
}
