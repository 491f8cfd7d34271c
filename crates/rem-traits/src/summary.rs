//! Summary policy for history dropped by compaction.

use async_trait::async_trait;
use rem_models::Message;

use crate::error::Result;

/// Messages removed from a session history, with their scope.
#[derive(Debug, Clone, Copy)]
pub struct DroppedWindow<'a> {
    pub tenant_id: &'a str,
    pub session_id: &'a str,
    pub user_id: Option<&'a str>,
    /// Dropped messages in chronological order.
    pub messages: &'a [Message],
}

impl DroppedWindow<'_> {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Produces the text of the synthetic context message that replaces a
/// dropped window. Must never return an empty string for a non-empty window.
#[async_trait]
pub trait WindowSummarizer: Send + Sync {
    async fn summarize(&self, window: DroppedWindow<'_>) -> Result<String>;
}
