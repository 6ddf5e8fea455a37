//! Action handler for conversation mutations
//!
//! Coordinates the in-memory collection, the local snapshot, and the CRM
//! API for mutations.
//!
//! Every mutation is optimistic, in this order:
//! 1. Patch the in-memory collection, so the dashboard updates at once
//! 2. Patch the local snapshot (best-effort; a store failure is logged,
//!    never surfaced)
//! 3. Issue the network mutation
//!
//! There is no field-level undo. When step 3 fails, the caller repairs
//! state by re-fetching the affected record, which overwrites the
//! optimistic patch with server truth.

use std::sync::Arc;

use log::{info, warn};

use crate::api::LcpClient;
use crate::error::LcpError;
use crate::models::{ConversationId, ConversationPatch, ThreadPatch};
use crate::state::ConversationSet;
use crate::storage::SnapshotStore;

/// Handler for conversation actions like mark-read, spam, and delete
pub struct ActionHandler {
    client: Arc<LcpClient>,
    store: Arc<dyn SnapshotStore>,
    conversations: Arc<ConversationSet>,
}

impl ActionHandler {
    /// Create a new action handler
    pub fn new(
        client: Arc<LcpClient>,
        store: Arc<dyn SnapshotStore>,
        conversations: Arc<ConversationSet>,
    ) -> Self {
        Self {
            client,
            store,
            conversations,
        }
    }

    /// Apply a partial update, optimistically then server-side
    pub fn update_thread(
        &self,
        id: &ConversationId,
        patch: &ThreadPatch,
    ) -> Result<(), LcpError> {
        info!("Updating thread {id}");
        self.apply_local(id, patch);
        self.client.update_thread(id, patch)
    }

    /// Delete a conversation, removing it locally first
    pub fn delete_thread(&self, id: &ConversationId) -> Result<(), LcpError> {
        info!("Deleting thread {id}");

        self.conversations.remove(id);
        if let Err(e) = self.store.remove_conversation(id) {
            warn!("Failed to remove {id} from snapshot: {e:#}");
        }

        self.client.delete_thread(id)
    }

    /// Mark a conversation as read
    pub fn mark_read(&self, id: &ConversationId) -> Result<(), LcpError> {
        self.update_thread(id, &ThreadPatch::read(true))
    }

    /// Set or clear the spam flag
    ///
    /// Flagging goes through the generic keyed update; clearing goes
    /// through the dedicated un-spam route, optionally naming the message
    /// that triggered the original classification.
    pub fn mark_spam(
        &self,
        id: &ConversationId,
        spam: bool,
        message_id: Option<&str>,
    ) -> Result<(), LcpError> {
        if spam {
            return self.update_thread(id, &ThreadPatch::spam(true));
        }

        info!("Clearing spam flag on thread {id}");
        self.apply_local(id, &ThreadPatch::spam(false));
        self.client.mark_not_spam(id, message_id)
    }

    /// Toggle automated follow-ups for a conversation
    ///
    /// Returns the new state (true = enabled).
    pub fn toggle_lcp(&self, id: &ConversationId) -> Result<bool, LcpError> {
        let enabled = self
            .conversations
            .get(id)
            .map(|c| c.thread.lcp_enabled)
            .unwrap_or(false);
        let next = !enabled;

        info!(
            "Toggling follow-ups for thread {id} to {}",
            if next { "enabled" } else { "disabled" }
        );
        self.update_thread(id, &ThreadPatch::lcp_enabled(next))?;
        Ok(next)
    }

    /// The optimistic half of a mutation: collection first, then snapshot
    fn apply_local(&self, id: &ConversationId, patch: &ThreadPatch) {
        self.conversations.apply_thread_patch(id, patch);
        if let Err(e) = self
            .store
            .update_conversation(id, &ConversationPatch::thread(patch.clone()))
        {
            warn!("Failed to patch snapshot for {id}: {e:#}");
        }
    }
}
