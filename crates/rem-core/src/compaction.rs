//! Session compaction under a token budget.
//!
//! The newest messages are kept while they fit; everything older is replaced
//! by one synthetic summary message produced by a `WindowSummarizer`. The
//! retained messages are always a contiguous suffix of the input.

use std::sync::Arc;

use rem_models::{CompactionResult, Message};
use rem_traits::{DroppedWindow, Result, WindowSummarizer};
use tracing::{debug, warn};

use crate::summary::build_summary_message;
use crate::tokens::TokenEstimator;

/// Shortest summary body worth injecting after truncation, in bytes.
const MIN_SUMMARY_BODY_BYTES: usize = 32;
const TRUNCATION_MARKER: &str = "...";

/// Trims session history to a token threshold.
#[derive(Clone)]
pub struct SessionCompactor {
    tenant_id: String,
    summarizer: Arc<dyn WindowSummarizer>,
    message_overhead: usize,
}

impl SessionCompactor {
    pub fn new(
        tenant_id: impl Into<String>,
        summarizer: Arc<dyn WindowSummarizer>,
        message_overhead: usize,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            summarizer,
            message_overhead,
        }
    }

    /// Fit `messages` into `token_threshold`.
    ///
    /// Returns the input unchanged when it already fits. Otherwise keeps the
    /// longest suffix that fits (at least the newest message) and injects a
    /// summary of the dropped prefix when the remaining budget allows it.
    /// An unknown `model_profile` is a validation error, even for empty input.
    pub async fn filter_within_token_threshold(
        &self,
        messages: &[Message],
        session_id: &str,
        user_id: Option<&str>,
        token_threshold: usize,
        model_profile: &str,
    ) -> Result<CompactionResult> {
        let estimator = TokenEstimator::for_model(model_profile, self.message_overhead)?;
        let costs: Vec<usize> = messages
            .iter()
            .map(|m| estimator.estimate_message(m))
            .collect();
        let original_total: usize = costs.iter().sum();

        if original_total <= token_threshold {
            return Ok(CompactionResult {
                filtered_messages: messages.to_vec(),
                total_tokens: original_total,
                tokens_before: original_total,
                dropped_count: 0,
                summary_injected: false,
            });
        }

        // Newest first; the newest message is kept even when it alone exceeds
        // the threshold.
        let mut kept_start = messages.len();
        let mut kept_tokens = 0usize;
        for (i, cost) in costs.iter().enumerate().rev() {
            if kept_start == messages.len() || kept_tokens + cost <= token_threshold {
                kept_tokens += cost;
                kept_start = i;
            } else {
                break;
            }
        }

        let tenant_id = self.tenant_id.as_str();
        let window_until = move |end: usize| DroppedWindow {
            tenant_id,
            session_id,
            user_id,
            messages: &messages[..end],
        };

        // Summarize once; shrinking the kept suffix only re-fits that body.
        let mut summary = None;
        if kept_start > 0 {
            let summarized_until = kept_start;
            let body = self.summarizer.summarize(window_until(kept_start)).await?;

            loop {
                let budget = token_threshold.saturating_sub(kept_tokens);
                if let Some(message) =
                    fit_summary(&estimator, window_until(kept_start), &body, budget)
                {
                    summary = Some(message);
                    break;
                }

                if messages.len() - kept_start > 1 {
                    kept_tokens -= costs[kept_start];
                    kept_start += 1;
                    debug!(
                        session_id = %session_id,
                        kept = messages.len() - kept_start,
                        "Dropping one more message to make room for the summary"
                    );
                } else {
                    warn!(
                        session_id = %session_id,
                        budget,
                        "No room for a summary of the dropped window; omitting it"
                    );
                    break;
                }
            }

            // The window grew: describe it once more, keeping the earlier
            // fit when the refreshed body does not fit.
            if summary.is_some() && kept_start != summarized_until {
                let window = window_until(kept_start);
                let budget = token_threshold.saturating_sub(kept_tokens);
                let refreshed = self.summarizer.summarize(window).await?;
                if let Some(message) = fit_summary(&estimator, window, &refreshed, budget) {
                    summary = Some(message);
                }
            }
        }

        let summary_tokens = summary
            .as_ref()
            .map_or(0, |m| estimator.estimate_message(m));
        let summary_injected = summary.is_some();

        let mut filtered = Vec::with_capacity(messages.len() - kept_start + 1);
        filtered.extend(summary);
        filtered.extend_from_slice(&messages[kept_start..]);

        let total_tokens = kept_tokens + summary_tokens;
        debug!(
            session_id = %session_id,
            tokens_before = original_total,
            tokens_after = total_tokens,
            dropped = kept_start,
            summary_injected,
            "Compacted session history"
        );

        Ok(CompactionResult {
            filtered_messages: filtered,
            total_tokens,
            tokens_before: original_total,
            dropped_count: kept_start,
            summary_injected,
        })
    }
}

/// Build a summary message costing at most `budget`, truncating the body if
/// needed. `None` when even a useful truncated body does not fit.
fn fit_summary(
    estimator: &TokenEstimator,
    window: DroppedWindow<'_>,
    body: &str,
    budget: usize,
) -> Option<Message> {
    let message = build_summary_message(window, body);
    if estimator.estimate_message(&message) <= budget {
        return Some(message);
    }

    let cost_with = |len: usize| {
        let truncated = format!("{}{}", &body[..len], TRUNCATION_MARKER);
        estimator.estimate_message(&build_summary_message(window, &truncated))
    };

    let boundaries: Vec<usize> = body.char_indices().map(|(i, _)| i).skip(1).collect();
    let fitting = boundaries.partition_point(|&len| cost_with(len) <= budget);
    let len = *boundaries.get(fitting.checked_sub(1)?)?;
    if len < MIN_SUMMARY_BODY_BYTES {
        return None;
    }

    let truncated = format!("{}{}", &body[..len], TRUNCATION_MARKER);
    Some(build_summary_message(window, &truncated))
}
