//! The `Formatter` external interface (§6): vendor-specific prompt
//! shaping, kept out of the core as a trait the same way `ClientWrapper`
//! hides vendor request/response shapes from `LLMSession` in the teacher.

use crate::error::ModelError;
use crate::message::Message;
use crate::model::ChatResponse;
use std::time::Instant;

/// Converts between the core's `Message` sequence and a vendor's prompt
/// representation. Formatters own role-remapping (a leading system
/// message may need remapping to user; tool results sometimes become user
/// turns) and media conversion (file paths to base64, URLs passed
/// through).
///
/// Spec invariant: round-tripping a text-only conversation through
/// `format` then `parse_response` preserves its textual content modulo
/// vendor-mandated role remapping.
pub trait Formatter: Send + Sync {
    /// Produces a vendor-specific prompt payload (e.g. a JSON array of
    /// role/content pairs) from the core's message sequence.
    fn format(&self, messages: &[Message]) -> serde_json::Value;

    /// Parses a vendor response body into a `ChatResponse`. `started_at`
    /// is accepted so implementations can attribute latency without
    /// reaching for a global clock.
    fn parse_response(&self, vendor_response: serde_json::Value, started_at: Instant) -> Result<ChatResponse, ModelError>;
}
