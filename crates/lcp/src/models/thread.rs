//! Thread model representing one lead conversation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a conversation
///
/// Assigned by the server on creation and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A thread aggregates the per-lead conversation metadata
///
/// Field names match the wire format of the CRM API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    /// Server-assigned conversation ID
    pub conversation_id: ConversationId,
    /// Whether the lead has been opened by an agent
    #[serde(default)]
    pub read: bool,
    /// Whether automated lead-conversion follow-ups are enabled
    #[serde(default)]
    pub lcp_enabled: bool,
    /// Whether the conversation was flagged as spam
    #[serde(default)]
    pub spam: bool,
    /// Whether the conversation needs manual review
    #[serde(default)]
    pub flag_for_review: bool,
    /// Whether an automated reply is currently being generated
    #[serde(default)]
    pub busy: bool,
    /// AI-generated summary of the conversation so far
    #[serde(default)]
    pub ai_summary: Option<String>,
    /// Lead's stated budget range
    #[serde(default)]
    pub budget_range: Option<String>,
    /// Lead's preferred property types
    #[serde(default)]
    pub preferred_property_types: Option<String>,
    /// Lead's purchase timeline
    #[serde(default)]
    pub timeline: Option<String>,
    /// EV score a message must exceed to flag the lead as likely to convert
    #[serde(default)]
    pub lcp_flag_threshold: f64,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// When the conversation was last modified server-side
    pub last_updated: DateTime<Utc>,
}

impl Thread {
    /// Create a new thread with default flags
    pub fn new(conversation_id: ConversationId, created_at: DateTime<Utc>) -> Self {
        Self {
            conversation_id,
            read: false,
            lcp_enabled: false,
            spam: false,
            flag_for_review: false,
            busy: false,
            ai_summary: None,
            budget_range: None,
            preferred_property_types: None,
            timeline: None,
            lcp_flag_threshold: 0.0,
            created_at,
            last_updated: created_at,
        }
    }
}

/// A partial update to a [`Thread`]
///
/// `None` fields are left untouched on merge, so two patches touching
/// different fields never clobber each other. Serialization skips unset
/// fields, which makes a serialized patch the `update_data` payload of the
/// generic keyed-update endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcp_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spam: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_for_review: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub busy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_property_types: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcp_flag_threshold: Option<f64>,
}

impl ThreadPatch {
    /// Patch that marks a thread read/unread
    pub fn read(read: bool) -> Self {
        Self {
            read: Some(read),
            ..Default::default()
        }
    }

    /// Patch that flags/unflags a thread as spam
    pub fn spam(spam: bool) -> Self {
        Self {
            spam: Some(spam),
            ..Default::default()
        }
    }

    /// Patch that toggles automated follow-ups
    pub fn lcp_enabled(enabled: bool) -> Self {
        Self {
            lcp_enabled: Some(enabled),
            ..Default::default()
        }
    }

    /// Patch carrying every field of `thread` (a full overwrite)
    pub fn replace(thread: &Thread) -> Self {
        Self {
            read: Some(thread.read),
            lcp_enabled: Some(thread.lcp_enabled),
            spam: Some(thread.spam),
            flag_for_review: Some(thread.flag_for_review),
            busy: Some(thread.busy),
            ai_summary: thread.ai_summary.clone(),
            budget_range: thread.budget_range.clone(),
            preferred_property_types: thread.preferred_property_types.clone(),
            timeline: thread.timeline.clone(),
            lcp_flag_threshold: Some(thread.lcp_flag_threshold),
        }
    }

    /// True if no field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the set fields into `thread`, leaving the rest untouched
    pub fn apply(&self, thread: &mut Thread) {
        if let Some(read) = self.read {
            thread.read = read;
        }
        if let Some(enabled) = self.lcp_enabled {
            thread.lcp_enabled = enabled;
        }
        if let Some(spam) = self.spam {
            thread.spam = spam;
        }
        if let Some(flag) = self.flag_for_review {
            thread.flag_for_review = flag;
        }
        if let Some(busy) = self.busy {
            thread.busy = busy;
        }
        if let Some(summary) = &self.ai_summary {
            thread.ai_summary = Some(summary.clone());
        }
        if let Some(budget) = &self.budget_range {
            thread.budget_range = Some(budget.clone());
        }
        if let Some(types) = &self.preferred_property_types {
            thread.preferred_property_types = Some(types.clone());
        }
        if let Some(timeline) = &self.timeline {
            thread.timeline = Some(timeline.clone());
        }
        if let Some(threshold) = self.lcp_flag_threshold {
            thread.lcp_flag_threshold = threshold;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_thread() -> Thread {
        let mut thread = Thread::new(ConversationId::new("c1"), Utc::now());
        thread.ai_summary = Some("Looking for a condo".to_string());
        thread.budget_range = Some("400k-500k".to_string());
        thread
    }

    #[test]
    fn test_apply_touches_only_set_fields() {
        let mut thread = make_thread();
        ThreadPatch::read(true).apply(&mut thread);

        assert!(thread.read);
        // Unrelated fields survive the merge
        assert_eq!(thread.ai_summary.as_deref(), Some("Looking for a condo"));
        assert_eq!(thread.budget_range.as_deref(), Some("400k-500k"));
        assert!(!thread.spam);
    }

    #[test]
    fn test_two_patches_do_not_clobber() {
        let mut thread = make_thread();
        ThreadPatch::read(true).apply(&mut thread);
        ThreadPatch::spam(true).apply(&mut thread);

        assert!(thread.read);
        assert!(thread.spam);
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let json = serde_json::to_value(ThreadPatch::read(true)).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["read"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_is_empty() {
        assert!(ThreadPatch::default().is_empty());
        assert!(!ThreadPatch::read(false).is_empty());
    }

    #[test]
    fn test_thread_deserializes_with_missing_flags() {
        let json = r#"{
            "conversation_id": "c9",
            "created_at": "2025-06-01T10:00:00Z",
            "last_updated": "2025-06-02T10:00:00Z"
        }"#;
        let thread: Thread = serde_json::from_str(json).unwrap();
        assert_eq!(thread.conversation_id.as_str(), "c9");
        assert!(!thread.read);
        assert!(thread.ai_summary.is_none());
    }
}
