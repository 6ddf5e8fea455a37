//! In-memory snapshot storage
//!
//! Used for tests and as a stub when no durable storage is wanted.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use super::traits::{SnapshotStats, SnapshotStore, DEFAULT_MAX_AGE_MINUTES};
use crate::models::{Conversation, ConversationId, ConversationPatch};

struct Snapshot {
    conversations: Vec<Conversation>,
    updated_at: DateTime<Utc>,
}

/// In-memory implementation of [`SnapshotStore`]
///
/// One snapshot per user id, protected by an RwLock.
pub struct InMemorySnapshotStore {
    user_id: RwLock<Option<String>>,
    snapshots: RwLock<HashMap<String, Snapshot>>,
}

impl InMemorySnapshotStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            user_id: RwLock::new(None),
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    /// Backdate the bound user's snapshot (test support)
    pub fn set_updated_at(&self, updated_at: DateTime<Utc>) -> Result<()> {
        let user = self.current_user()?;
        let mut snapshots = self.snapshots.write().unwrap();
        if let Some(snapshot) = snapshots.get_mut(&user) {
            snapshot.updated_at = updated_at;
        }
        Ok(())
    }

    fn current_user(&self) -> Result<String> {
        match self.user_id.read().unwrap().as_ref() {
            Some(user) => Ok(user.clone()),
            None => bail!("snapshot store not initialized"),
        }
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn initialize(&self, user_id: &str) -> Result<()> {
        *self.user_id.write().unwrap() = Some(user_id.to_string());
        Ok(())
    }

    fn has_data(&self) -> Result<bool> {
        let user = self.current_user()?;
        Ok(self.snapshots.read().unwrap().contains_key(&user))
    }

    fn is_stale(&self, max_age_minutes: i64) -> Result<bool> {
        let user = self.current_user()?;
        let snapshots = self.snapshots.read().unwrap();
        let Some(snapshot) = snapshots.get(&user) else {
            return Ok(true);
        };
        let age = Utc::now() - snapshot.updated_at;
        Ok(age.num_minutes() >= max_age_minutes)
    }

    fn store_conversations(&self, conversations: &[Conversation]) -> Result<()> {
        let user = self.current_user()?;
        let mut snapshots = self.snapshots.write().unwrap();
        snapshots.insert(
            user,
            Snapshot {
                conversations: conversations.to_vec(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn get_conversations(&self) -> Result<Option<Vec<Conversation>>> {
        let user = self.current_user()?;
        let snapshots = self.snapshots.read().unwrap();
        Ok(snapshots.get(&user).map(|s| s.conversations.clone()))
    }

    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        let user = self.current_user()?;
        let snapshots = self.snapshots.read().unwrap();
        Ok(snapshots
            .get(&user)
            .and_then(|s| s.conversations.iter().find(|c| c.id() == id).cloned()))
    }

    fn update_conversation(&self, id: &ConversationId, patch: &ConversationPatch) -> Result<()> {
        let user = self.current_user()?;
        let mut snapshots = self.snapshots.write().unwrap();
        if let Some(snapshot) = snapshots.get_mut(&user) {
            if let Some(conversation) = snapshot.conversations.iter_mut().find(|c| c.id() == id) {
                patch.apply(conversation);
            }
        }
        Ok(())
    }

    fn remove_conversation(&self, id: &ConversationId) -> Result<()> {
        let user = self.current_user()?;
        let mut snapshots = self.snapshots.write().unwrap();
        if let Some(snapshot) = snapshots.get_mut(&user) {
            snapshot.conversations.retain(|c| c.id() != id);
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let user = self.current_user()?;
        self.snapshots.write().unwrap().remove(&user);
        Ok(())
    }

    fn stats(&self) -> Result<SnapshotStats> {
        let user = self.current_user()?;
        let snapshots = self.snapshots.read().unwrap();
        let snapshot = snapshots.get(&user);

        let is_stale = match snapshot {
            Some(s) => (Utc::now() - s.updated_at).num_minutes() >= DEFAULT_MAX_AGE_MINUTES,
            None => true,
        };

        Ok(SnapshotStats {
            has_data: snapshot.is_some(),
            is_stale,
            conversation_count: snapshot.map(|s| s.conversations.len()).unwrap_or(0),
            last_updated: snapshot.map(|s| s.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageKind, Thread, ThreadPatch};
    use chrono::Duration;

    fn make_conversation(id: &str) -> Conversation {
        let mut thread = Thread::new(ConversationId::new(id), Utc::now());
        thread.ai_summary = Some(format!("Summary for {id}"));
        Conversation::new(thread)
    }

    fn make_store() -> InMemorySnapshotStore {
        let store = InMemorySnapshotStore::new();
        store.initialize("agent-1").unwrap();
        store
    }

    #[test]
    fn test_requires_initialization() {
        let store = InMemorySnapshotStore::new();
        assert!(store.has_data().is_err());
        assert!(store.get_conversations().is_err());
    }

    #[test]
    fn test_store_and_get() {
        let store = make_store();
        assert!(!store.has_data().unwrap());

        store
            .store_conversations(&[make_conversation("c1"), make_conversation("c2")])
            .unwrap();

        assert!(store.has_data().unwrap());
        assert_eq!(store.get_conversations().unwrap().unwrap().len(), 2);
        assert!(store
            .get_conversation(&ConversationId::new("c1"))
            .unwrap()
            .is_some());
        assert!(store
            .get_conversation(&ConversationId::new("c9"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let store = make_store();
        store.store_conversations(&[make_conversation("c1")]).unwrap();

        store.initialize("agent-2").unwrap();
        assert!(!store.has_data().unwrap());

        store.initialize("agent-1").unwrap();
        assert!(store.has_data().unwrap());
    }

    #[test]
    fn test_staleness_threshold() {
        let store = make_store();

        // No snapshot at all is stale
        assert!(store.is_stale(10).unwrap());

        store.store_conversations(&[make_conversation("c1")]).unwrap();

        store
            .set_updated_at(Utc::now() - Duration::minutes(9))
            .unwrap();
        assert!(!store.is_stale(10).unwrap());

        store
            .set_updated_at(Utc::now() - Duration::minutes(11))
            .unwrap();
        assert!(store.is_stale(10).unwrap());
    }

    #[test]
    fn test_update_merges_field_level() {
        let store = make_store();
        store.store_conversations(&[make_conversation("c1")]).unwrap();

        store
            .update_conversation(
                &ConversationId::new("c1"),
                &ConversationPatch::thread(ThreadPatch::read(true)),
            )
            .unwrap();

        let conv = store
            .get_conversation(&ConversationId::new("c1"))
            .unwrap()
            .unwrap();
        assert!(conv.thread.read);
        // A field the patch never mentioned survives
        assert_eq!(conv.thread.ai_summary.as_deref(), Some("Summary for c1"));
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let store = make_store();
        store.store_conversations(&[make_conversation("c1")]).unwrap();

        store
            .update_conversation(
                &ConversationId::new("ghost"),
                &ConversationPatch::thread(ThreadPatch::read(true)),
            )
            .unwrap();

        assert_eq!(store.get_conversations().unwrap().unwrap().len(), 1);
    }

    #[test]
    fn test_update_does_not_refresh_age() {
        let store = make_store();
        store.store_conversations(&[make_conversation("c1")]).unwrap();
        let backdated = Utc::now() - Duration::minutes(30);
        store.set_updated_at(backdated).unwrap();

        store
            .update_conversation(
                &ConversationId::new("c1"),
                &ConversationPatch::thread(ThreadPatch::read(true)),
            )
            .unwrap();

        assert!(store.is_stale(10).unwrap());
    }

    #[test]
    fn test_update_replaces_messages_wholesale() {
        let store = make_store();
        store.store_conversations(&[make_conversation("c1")]).unwrap();

        let message = crate::models::Message::new(
            ConversationId::new("c1"),
            MessageKind::Inbound,
            "Hello",
            Utc::now(),
        );
        store
            .update_conversation(
                &ConversationId::new("c1"),
                &ConversationPatch::messages(vec![message]),
            )
            .unwrap();

        let conv = store
            .get_conversation(&ConversationId::new("c1"))
            .unwrap()
            .unwrap();
        assert_eq!(conv.messages.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let store = make_store();
        store
            .store_conversations(&[make_conversation("c1"), make_conversation("c2")])
            .unwrap();

        store.remove_conversation(&ConversationId::new("c1")).unwrap();
        assert_eq!(store.get_conversations().unwrap().unwrap().len(), 1);

        store.clear().unwrap();
        assert!(!store.has_data().unwrap());
        assert!(store.get_conversations().unwrap().is_none());
    }

    #[test]
    fn test_stats() {
        let store = make_store();

        let stats = store.stats().unwrap();
        assert!(!stats.has_data);
        assert!(stats.is_stale);
        assert_eq!(stats.conversation_count, 0);
        assert!(stats.last_updated.is_none());

        store
            .store_conversations(&[make_conversation("c1"), make_conversation("c2")])
            .unwrap();

        let stats = store.stats().unwrap();
        assert!(stats.has_data);
        assert!(!stats.is_stale);
        assert_eq!(stats.conversation_count, 2);
        assert!(stats.last_updated.is_some());
    }
}
