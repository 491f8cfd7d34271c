//! Summary policies for history dropped by compaction.
//!
//! `GraphWindowSummarizer` pulls `content_summary` text from moment entities
//! linked to the keys mentioned in the dropped messages. When it finds none,
//! it falls back to the structural placeholder produced by
//! `PlaceholderSummarizer`.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use rem_models::{EntityType, Message, MessageRole};
use rem_traits::{DroppedWindow, Result, WindowSummarizer};
use tracing::{debug, warn};

use crate::config::CompactionConfig;
use crate::query::{QueryExecutor, TraverseQuery};

/// Marker opening every synthetic summary message.
pub const SUMMARY_PREFIX: &str = "[Conversation Summary]";

static KEY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}](?:[\p{L}\p{N}_./:-]*[\p{L}\p{N}])?").expect("Invalid regex")
});

/// Whether a message is a synthetic compaction summary.
pub fn is_summary_message(message: &Message) -> bool {
    message.role == MessageRole::System && message.text().starts_with(SUMMARY_PREFIX)
}

/// Build the synthetic message that stands in for a dropped window.
///
/// It inherits the session scope and the timestamp of the newest dropped
/// message, so chronological order is preserved.
pub fn build_summary_message(window: DroppedWindow<'_>, body: &str) -> Message {
    let mut message = Message::new(
        window.tenant_id,
        window.session_id,
        MessageRole::System,
        Some(format!("{} {}", SUMMARY_PREFIX, body)),
    );
    message.user_id = window.user_id.map(str::to_string);
    if let Some(last) = window.messages.last() {
        message.created_at = last.created_at;
    }
    message
}

/// Structural description of a dropped window.
pub fn placeholder_text(window: DroppedWindow<'_>) -> String {
    let (Some(first), Some(last)) = (window.messages.first(), window.messages.last()) else {
        return "[no earlier messages omitted]".to_string();
    };
    let format = "%Y-%m-%dT%H:%M:%SZ";
    if window.len() == 1 {
        return format!(
            "[1 earlier message omitted, sent at {}]",
            first.created_at.format(format)
        );
    }
    format!(
        "[{} earlier messages omitted, spanning {} to {}]",
        window.len(),
        first.created_at.format(format),
        last.created_at.format(format)
    )
}

/// Extract candidate entity keys from message text.
///
/// Tokens that look like business keys (contain a separator or a digit) come
/// first, then plain words of at least three characters. Duplicates are
/// dropped and the result is capped at `max_keys`.
pub fn extract_candidate_keys(messages: &[Message], max_keys: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keyed = Vec::new();
    let mut plain = Vec::new();

    for message in messages.iter().filter(|m| !is_summary_message(m)) {
        for token in KEY_TOKEN.find_iter(message.text()).map(|m| m.as_str()) {
            if token.chars().count() < 3 || !seen.insert(token.to_string()) {
                continue;
            }
            let key_like = token
                .chars()
                .any(|c| c.is_ascii_digit() || matches!(c, '-' | '_' | '.' | '/' | ':'));
            if key_like {
                keyed.push(token.to_string());
            } else {
                plain.push(token.to_string());
            }
        }
    }

    keyed.extend(plain);
    keyed.truncate(max_keys);
    keyed
}

/// Placeholder-only policy: "N messages omitted, spanning X to Y".
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderSummarizer;

#[async_trait]
impl WindowSummarizer for PlaceholderSummarizer {
    async fn summarize(&self, window: DroppedWindow<'_>) -> Result<String> {
        Ok(placeholder_text(window))
    }
}

/// Graph-aware policy backed by LOOKUP and TRAVERSE.
#[derive(Clone)]
pub struct GraphWindowSummarizer {
    executor: Arc<QueryExecutor>,
    traverse_depth: u32,
    edge_types: Vec<String>,
    max_keys: usize,
}

impl GraphWindowSummarizer {
    pub fn new(executor: Arc<QueryExecutor>, config: &CompactionConfig) -> Self {
        let traverse_depth = config
            .summary_traverse_depth
            .min(executor.config().max_traverse_depth);
        Self {
            executor,
            traverse_depth,
            edge_types: config.summary_edge_types.clone(),
            max_keys: config.max_summary_keys,
        }
    }

    /// `content_summary` of moments linked to the window, in discovery order.
    pub async fn collect_moment_summaries(&self, window: DroppedWindow<'_>) -> Result<Vec<String>> {
        let keys = extract_candidate_keys(window.messages, self.max_keys);
        let mut seen = HashSet::new();
        let mut summaries = Vec::new();

        for key in keys {
            let mut moment_keys = Vec::new();

            let records = self.executor.lookup(&key, window.user_id).await?;
            if records.is_empty() {
                continue;
            }
            moment_keys.extend(
                records
                    .iter()
                    .filter(|r| r.entity_type == EntityType::Moment)
                    .map(|r| r.entity_key.clone()),
            );

            if self.traverse_depth > 0 {
                let mut query = TraverseQuery::new(key.as_str(), self.traverse_depth)
                    .edge_types(self.edge_types.iter().cloned());
                query.user_id = window.user_id.map(str::to_string);
                // Rows are typed by the first table holding the key; moments
                // are picked out by the lookup below.
                let rows = self.executor.traverse(&query).await?;
                moment_keys.extend(rows.into_iter().map(|row| row.entity_key));
            }

            for moment_key in moment_keys {
                if !seen.insert(moment_key.clone()) {
                    continue;
                }
                let summary = self
                    .executor
                    .lookup(&moment_key, window.user_id)
                    .await?
                    .into_iter()
                    .find(|r| r.entity_type == EntityType::Moment)
                    .and_then(|r| r.content_summary)
                    .filter(|s| !s.trim().is_empty());
                if let Some(summary) = summary {
                    summaries.push(summary);
                }
            }
        }

        Ok(summaries)
    }
}

#[async_trait]
impl WindowSummarizer for GraphWindowSummarizer {
    async fn summarize(&self, window: DroppedWindow<'_>) -> Result<String> {
        let summaries = match self.collect_moment_summaries(window).await {
            Ok(summaries) => summaries,
            Err(err) => {
                warn!(
                    session_id = %window.session_id,
                    error = %err,
                    "Graph context unavailable for dropped window"
                );
                Vec::new()
            }
        };

        if summaries.is_empty() {
            return Ok(placeholder_text(window));
        }

        debug!(
            session_id = %window.session_id,
            moments = summaries.len(),
            "Summarized dropped window from graph context"
        );
        let mut text = format!(
            "{} earlier messages condensed. Related moments:",
            window.len()
        );
        for summary in summaries {
            text.push_str("\n- ");
            text.push_str(summary.trim());
        }
        Ok(text)
    }
}
