//! Message model for entries within a conversation

use super::ConversationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The direction/origin of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// From the lead to the agent
    Inbound,
    /// From the agent (or automation) to the lead
    Outbound,
    /// Generated by the platform (state changes, hand-offs)
    System,
    /// Internal agent note, never delivered
    Note,
}

/// A single message within a conversation
///
/// Messages are append-only and ordered by ascending timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned message ID, absent on some legacy records
    #[serde(default)]
    pub id: Option<String>,
    /// The conversation this message belongs to
    pub conversation_id: ConversationId,
    /// Direction/origin (wire name `type`)
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Message body
    pub content: String,
    /// When the message was sent
    pub timestamp: DateTime<Utc>,
    /// Sender address or display name
    #[serde(default)]
    pub sender: Option<String>,
    /// Recipient address or display name
    #[serde(default)]
    pub recipient: Option<String>,
    /// Engagement-value score (0-100), present on scored messages only
    #[serde(default)]
    pub ev_score: Option<f64>,
}

impl Message {
    /// Create a new message with the required fields
    pub fn new(
        conversation_id: ConversationId,
        kind: MessageKind,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            conversation_id,
            kind,
            content: content.into(),
            timestamp,
            sender: None,
            recipient: None,
            ev_score: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_ev_score(mut self, score: f64) -> Self {
        self.ev_score = Some(score);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&MessageKind::Inbound).unwrap();
        assert_eq!(json, "\"inbound\"");

        let kind: MessageKind = serde_json::from_str("\"note\"").unwrap();
        assert_eq!(kind, MessageKind::Note);
    }

    #[test]
    fn test_message_roundtrip_uses_type_field() {
        let msg = Message::new(
            ConversationId::new("c1"),
            MessageKind::Outbound,
            "Thanks for reaching out!",
            Utc::now(),
        )
        .with_sender("agent@leadline.example")
        .with_ev_score(72.0);

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "outbound");
        assert_eq!(json["ev_score"], 72.0);

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind, MessageKind::Outbound);
        assert_eq!(back.ev_score, Some(72.0));
    }

    #[test]
    fn test_message_deserializes_without_optional_fields() {
        let json = r#"{
            "conversation_id": "c1",
            "type": "inbound",
            "content": "Is the listing still available?",
            "timestamp": "2025-06-01T10:00:00Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.id.is_none());
        assert!(msg.sender.is_none());
        assert!(msg.ev_score.is_none());
    }
}
