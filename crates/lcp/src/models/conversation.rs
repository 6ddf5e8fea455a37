//! Conversation: a thread plus its ordered messages
//!
//! This is the unit returned by the bulk-fetch endpoint and the unit held
//! in the local snapshot.

use serde::{Deserialize, Serialize};

use super::{ConversationId, Message, Thread, ThreadPatch};

/// A thread together with its messages, ordered by ascending timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub thread: Thread,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(thread: Thread) -> Self {
        Self {
            thread,
            messages: Vec::new(),
        }
    }

    pub fn with_messages(thread: Thread, mut messages: Vec<Message>) -> Self {
        messages.sort_by_key(|m| m.timestamp);
        Self { thread, messages }
    }

    pub fn id(&self) -> &ConversationId {
        &self.thread.conversation_id
    }

    /// The newest message carrying an EV score, if any
    pub fn latest_scored_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.ev_score.is_some())
    }
}

/// A partial update to a [`Conversation`]
///
/// The merge is shallow per top-level sub-object: a thread patch merges
/// field-by-field into the existing thread, a messages patch replaces the
/// message list wholesale. Unset sub-objects are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<ThreadPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

impl ConversationPatch {
    /// Patch touching only thread fields
    pub fn thread(patch: ThreadPatch) -> Self {
        Self {
            thread: Some(patch),
            messages: None,
        }
    }

    /// Patch replacing the message list
    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            thread: None,
            messages: Some(messages),
        }
    }

    /// Merge into `conversation`
    pub fn apply(&self, conversation: &mut Conversation) {
        if let Some(thread_patch) = &self.thread {
            thread_patch.apply(&mut conversation.thread);
        }
        if let Some(messages) = &self.messages {
            conversation.messages = messages.clone();
            conversation.messages.sort_by_key(|m| m.timestamp);
        }
    }
}
