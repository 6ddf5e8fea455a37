//! Aggregate metrics derived from the conversation collection

use serde::{Deserialize, Serialize};

/// Summary counters for the dashboard header
///
/// Always recomputed from the conversation collection, never persisted.
/// Wire names are camelCase to match the dashboard API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMetrics {
    /// Unread conversations
    pub new_leads: usize,
    /// Unread conversations that already have messages waiting
    pub pending_replies: usize,
    /// Unread conversations with no messages yet
    pub unopened_leads: usize,
    /// Share of conversations with automated follow-ups enabled, in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion_rate: Option<f64>,
    /// Mean response latency across all conversations, in minutes
    pub average_response_time: f64,
}

/// Server-side usage statistics for a time range
///
/// Returned by `usage/stats`; present fields override the locally derived
/// metric values on merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    #[serde(default)]
    pub conversion_rate: Option<f64>,
    #[serde(default)]
    pub average_response_time: Option<f64>,
}
