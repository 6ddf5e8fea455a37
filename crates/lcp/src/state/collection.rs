//! The canonical in-memory conversation collection
//!
//! One instance per session, shared between the state store and the
//! action handler. All access goes through an RwLock; readers get clones
//! so no lock is held across caller code.

use std::sync::RwLock;

use crate::models::{Conversation, ConversationId, ConversationPatch, Thread, ThreadPatch};

/// Shared, lock-protected collection of conversations
pub struct ConversationSet {
    inner: RwLock<Vec<Conversation>>,
}

impl ConversationSet {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Vec::new()),
        }
    }

    /// Replace the whole collection
    pub fn replace_all(&self, conversations: Vec<Conversation>) {
        *self.inner.write().unwrap() = conversations;
    }

    /// Clone of the current collection
    pub fn snapshot(&self) -> Vec<Conversation> {
        self.inner.read().unwrap().clone()
    }

    /// Clone of one conversation by id
    pub fn get(&self, id: &ConversationId) -> Option<Conversation> {
        self.inner
            .read()
            .unwrap()
            .iter()
            .find(|c| c.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// Merge a thread patch into the matching conversation
    ///
    /// Returns false if the id is absent.
    pub fn apply_thread_patch(&self, id: &ConversationId, patch: &ThreadPatch) -> bool {
        let mut inner = self.inner.write().unwrap();
        match inner.iter_mut().find(|c| c.id() == id) {
            Some(conversation) => {
                ConversationPatch::thread(patch.clone()).apply(conversation);
                true
            }
            None => false,
        }
    }

    /// Replace a conversation's thread with fresh server state, keeping
    /// the messages already held; inserts a new conversation if the id
    /// is absent (a refetch can resurrect a locally deleted record)
    pub fn splice_thread(&self, thread: Thread) {
        let mut inner = self.inner.write().unwrap();
        match inner
            .iter_mut()
            .find(|c| c.id() == &thread.conversation_id)
        {
            Some(conversation) => conversation.thread = thread,
            None => inner.push(Conversation::new(thread)),
        }
    }

    /// Remove a conversation; returns false if the id was absent
    pub fn remove(&self, id: &ConversationId) -> bool {
        let mut inner = self.inner.write().unwrap();
        let before = inner.len();
        inner.retain(|c| c.id() != id);
        inner.len() != before
    }
}

impl Default for ConversationSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_conversation(id: &str) -> Conversation {
        Conversation::new(Thread::new(ConversationId::new(id), Utc::now()))
    }

    #[test]
    fn test_replace_and_snapshot() {
        let set = ConversationSet::new();
        assert!(set.is_empty());

        set.replace_all(vec![make_conversation("a"), make_conversation("b")]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.snapshot().len(), 2);
    }

    #[test]
    fn test_apply_thread_patch() {
        let set = ConversationSet::new();
        set.replace_all(vec![make_conversation("a")]);

        assert!(set.apply_thread_patch(&ConversationId::new("a"), &ThreadPatch::read(true)));
        assert!(set.get(&ConversationId::new("a")).unwrap().thread.read);

        assert!(!set.apply_thread_patch(&ConversationId::new("ghost"), &ThreadPatch::read(true)));
    }

    #[test]
    fn test_splice_keeps_messages() {
        let now = Utc::now();
        let mut conversation = make_conversation("a");
        conversation.messages.push(crate::models::Message::new(
            ConversationId::new("a"),
            crate::models::MessageKind::Inbound,
            "hello",
            now,
        ));
        let set = ConversationSet::new();
        set.replace_all(vec![conversation]);

        let mut fresh = Thread::new(ConversationId::new("a"), now);
        fresh.read = true;
        set.splice_thread(fresh);

        let spliced = set.get(&ConversationId::new("a")).unwrap();
        assert!(spliced.thread.read);
        assert_eq!(spliced.messages.len(), 1);
    }

    #[test]
    fn test_splice_inserts_missing() {
        let set = ConversationSet::new();
        set.splice_thread(Thread::new(ConversationId::new("new"), Utc::now()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_remove() {
        let set = ConversationSet::new();
        set.replace_all(vec![make_conversation("a")]);

        assert!(set.remove(&ConversationId::new("a")));
        assert!(!set.remove(&ConversationId::new("a")));
        assert!(set.is_empty());
    }
}
