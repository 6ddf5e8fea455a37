//! Metric derivation over the conversation collection
//!
//! Pure functions: the collection goes in, the dashboard counters come
//! out. Server-side usage statistics are merged on top when available.

use crate::models::{Conversation, ThreadMetrics, UsageStats};

/// Derive dashboard metrics from the conversation collection
pub fn derive_metrics(conversations: &[Conversation]) -> ThreadMetrics {
    let total = conversations.len();

    let mut new_leads = 0;
    let mut pending_replies = 0;
    let mut unopened_leads = 0;
    let mut lcp_enabled = 0;

    for conversation in conversations {
        if conversation.thread.lcp_enabled {
            lcp_enabled += 1;
        }
        if conversation.thread.read {
            continue;
        }
        new_leads += 1;
        if conversation.messages.is_empty() {
            unopened_leads += 1;
        } else {
            pending_replies += 1;
        }
    }

    let conversion_rate = if total == 0 {
        0.0
    } else {
        lcp_enabled as f64 / total as f64 * 100.0
    };

    ThreadMetrics {
        new_leads,
        pending_replies,
        unopened_leads,
        conversion_rate: Some(conversion_rate),
        average_response_time: average_response_minutes(conversations),
    }
}

/// Overlay server-side usage statistics onto derived metrics
///
/// Present fields win over the local derivation.
pub fn merge_usage(mut metrics: ThreadMetrics, stats: &UsageStats) -> ThreadMetrics {
    if let Some(rate) = stats.conversion_rate {
        metrics.conversion_rate = Some(rate);
    }
    if let Some(latency) = stats.average_response_time {
        metrics.average_response_time = latency;
    }
    metrics
}

/// Mean response latency across all conversations, in minutes
///
/// Pools the deltas between consecutive messages of each conversation.
/// Non-positive deltas are out-of-order records, not causal responses,
/// and contribute nothing. Returns 0 when no valid delta exists.
fn average_response_minutes(conversations: &[Conversation]) -> f64 {
    let mut total_seconds = 0i64;
    let mut count = 0usize;

    for conversation in conversations {
        for pair in conversation.messages.windows(2) {
            let delta = (pair[1].timestamp - pair[0].timestamp).num_seconds();
            if delta > 0 {
                total_seconds += delta;
                count += 1;
            }
        }
    }

    if count == 0 {
        0.0
    } else {
        total_seconds as f64 / count as f64 / 60.0
    }
}
