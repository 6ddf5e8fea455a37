//! Snapshot storage trait definitions

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{Conversation, ConversationId, ConversationPatch};

/// Age threshold used by [`SnapshotStore::stats`]
pub const DEFAULT_MAX_AGE_MINUTES: i64 = 10;

/// Summary of a user's snapshot
#[derive(Debug, Clone)]
pub struct SnapshotStats {
    pub has_data: bool,
    pub is_stale: bool,
    pub conversation_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Trait for per-user conversation snapshot storage
///
/// A store is bound to one user namespace via [`initialize`] before any
/// other operation; operations on an unbound store fail.
///
/// [`initialize`]: SnapshotStore::initialize
pub trait SnapshotStore: Send + Sync {
    /// Bind the store to a user namespace
    fn initialize(&self, user_id: &str) -> Result<()>;

    /// Whether any snapshot exists for the bound user
    fn has_data(&self) -> Result<bool>;

    /// True if no snapshot exists or it is older than `max_age_minutes`
    fn is_stale(&self, max_age_minutes: i64) -> Result<bool>;

    /// Replace the full snapshot and refresh its age
    fn store_conversations(&self, conversations: &[Conversation]) -> Result<()>;

    /// The full snapshot, or None if none exists
    fn get_conversations(&self) -> Result<Option<Vec<Conversation>>>;

    /// One conversation by id, or None if absent
    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>>;

    /// Merge a partial patch into the matching entry
    ///
    /// The merge is field-level: unset patch fields never overwrite stored
    /// ones, so an update to one flag cannot erase a field written by a
    /// different call. No-op if the id is absent. Does not refresh the
    /// snapshot age.
    fn update_conversation(&self, id: &ConversationId, patch: &ConversationPatch) -> Result<()>;

    /// Delete the entry if present
    fn remove_conversation(&self, id: &ConversationId) -> Result<()>;

    /// Drop the bound user's snapshot entirely
    fn clear(&self) -> Result<()>;

    /// Snapshot summary using [`DEFAULT_MAX_AGE_MINUTES`]
    fn stats(&self) -> Result<SnapshotStats>;
}
