//! Thread filtering and view functions
//!
//! Filters produce derived views for the dashboard list; nothing here is
//! stored. The canonical collection stays untouched.

use serde::{Deserialize, Serialize};

use crate::models::Conversation;

/// Reporting window for usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week,
    #[default]
    Month,
    Year,
}

impl TimeRange {
    /// Wire value for the `timeRange` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// Active filters for the conversation list view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadFilters {
    /// Only unread conversations
    pub unread: bool,
    /// Only conversations flagged for review
    pub review: bool,
    /// Only conversations whose latest scored message clears the flag
    /// threshold
    pub completion: bool,
    /// Reporting window for usage statistics
    pub time_range: TimeRange,
    /// Free-text search over summary and message content
    pub search: Option<String>,
}

/// Whether a conversation passes the active filters
fn matches(conversation: &Conversation, filters: &ThreadFilters) -> bool {
    if filters.unread && conversation.thread.read {
        return false;
    }
    if filters.review && !conversation.thread.flag_for_review {
        return false;
    }
    if filters.completion {
        // Newest scored message decides; a conversation with no scored
        // message never passes the completion filter.
        match conversation.latest_scored_message().and_then(|m| m.ev_score) {
            Some(score) if score > conversation.thread.lcp_flag_threshold => {}
            _ => return false,
        }
    }
    if let Some(needle) = &filters.search {
        let needle = needle.trim().to_lowercase();
        if !needle.is_empty() && !matches_search(conversation, &needle) {
            return false;
        }
    }
    true
}

fn matches_search(conversation: &Conversation, needle: &str) -> bool {
    if let Some(summary) = &conversation.thread.ai_summary {
        if summary.to_lowercase().contains(needle) {
            return true;
        }
    }
    conversation.messages.iter().any(|m| {
        m.content.to_lowercase().contains(needle)
            || m.sender
                .as_deref()
                .is_some_and(|s| s.to_lowercase().contains(needle))
    })
}

/// Filter the collection, preserving its order
pub fn filter_threads<'a>(
    conversations: &'a [Conversation],
    filters: &ThreadFilters,
) -> Vec<&'a Conversation> {
    conversations
        .iter()
        .filter(|c| matches(c, filters))
        .collect()
}

/// Filtered view sorted by last update, newest first
pub fn visible_threads(
    conversations: &[Conversation],
    filters: &ThreadFilters,
) -> Vec<Conversation> {
    let mut visible: Vec<Conversation> = conversations
        .iter()
        .filter(|c| matches(c, filters))
        .cloned()
        .collect();
    visible.sort_by(|a, b| b.thread.last_updated.cmp(&a.thread.last_updated));
    visible
}
