use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Result of filtering a session history into a token budget.
///
/// Transient: recomputed per call, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactionResult {
    /// Retained suffix in chronological order, optionally prefixed by one
    /// synthetic summary message.
    pub filtered_messages: Vec<Message>,
    /// Estimated tokens of `filtered_messages`, summary included.
    pub total_tokens: usize,
    /// Estimated tokens of the input history.
    pub tokens_before: usize,
    /// Number of input messages not present in the output.
    pub dropped_count: usize,
    /// Whether a synthetic summary message was prepended.
    pub summary_injected: bool,
}
