//! Session-wide conversation state
//!
//! One [`ThreadsState`] per authenticated session owns the canonical
//! in-memory collection, the derived metrics, the active filters, and the
//! error/loading flags the dashboard renders. Mutations are optimistic
//! (see [`ActionHandler`]) and reconciled by refetching; a liveness flag
//! keeps late-arriving responses from writing after teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{info, warn};

use super::collection::ConversationSet;
use super::poller::POLL_INTERVAL;
use crate::actions::ActionHandler;
use crate::api::{CacheMode, LcpClient};
use crate::error::LcpError;
use crate::metrics::{derive_metrics, merge_usage};
use crate::models::{
    Conversation, ConversationId, ConversationPatch, ThreadMetrics, ThreadPatch, UsageStats,
};
use crate::query::{visible_threads, ThreadFilters, TimeRange};
use crate::storage::{SnapshotStore, DEFAULT_MAX_AGE_MINUTES};

/// Aggregated conversation state for one session
pub struct ThreadsState {
    user_id: String,
    client: Arc<LcpClient>,
    store: Arc<dyn SnapshotStore>,
    conversations: Arc<ConversationSet>,
    actions: ActionHandler,
    metrics: RwLock<ThreadMetrics>,
    usage: RwLock<UsageStats>,
    loading: AtomicBool,
    error: RwLock<Option<String>>,
    last_fetch: RwLock<Option<DateTime<Utc>>>,
    filters: RwLock<ThreadFilters>,
    selected: RwLock<Option<ConversationId>>,
    alive: AtomicBool,
}

impl ThreadsState {
    /// Create the state store for a session, binding the snapshot store
    /// to the user's namespace
    pub fn new(
        user_id: impl Into<String>,
        client: Arc<LcpClient>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Arc<Self>> {
        let user_id = user_id.into();
        store.initialize(&user_id)?;

        let conversations = Arc::new(ConversationSet::new());
        let actions = ActionHandler::new(
            Arc::clone(&client),
            Arc::clone(&store),
            Arc::clone(&conversations),
        );

        Ok(Arc::new(Self {
            user_id,
            client,
            store,
            conversations,
            actions,
            metrics: RwLock::new(ThreadMetrics::default()),
            usage: RwLock::new(UsageStats::default()),
            loading: AtomicBool::new(false),
            error: RwLock::new(None),
            last_fetch: RwLock::new(None),
            filters: RwLock::new(ThreadFilters::default()),
            selected: RwLock::new(None),
            alive: AtomicBool::new(true),
        }))
    }

    /// Session-start load: seed from a fresh snapshot when one exists,
    /// otherwise fetch from the network
    pub fn bootstrap(&self) -> Result<(), LcpError> {
        match self.hydrate() {
            Ok(true) => {
                info!("Hydrated {} conversations from snapshot", self.conversations.len());
                Ok(())
            }
            Ok(false) => self.fetch(),
            Err(e) => {
                warn!("Snapshot hydration failed: {e:#}");
                self.fetch()
            }
        }
    }

    /// Load the full collection and usage statistics, concurrently
    ///
    /// On success the collection is overwritten wholesale and mirrored to
    /// the snapshot; on failure prior state stays and the error string is
    /// recorded for the dashboard.
    pub fn fetch(&self) -> Result<(), LcpError> {
        self.loading.store(true, Ordering::SeqCst);
        let range = self.filters.read().unwrap().time_range;

        let (threads_result, usage_result) = rayon::join(
            || self.client.get_all_threads(&self.user_id, CacheMode::Use),
            || self.client.usage_stats(range, CacheMode::Use),
        );

        let outcome = threads_result.and_then(|c| usage_result.map(|u| (c, u)));
        let result = match outcome {
            Ok((conversations, usage)) => {
                if self.is_alive() {
                    self.conversations.replace_all(conversations.clone());
                    if let Err(e) = self.store.store_conversations(&conversations) {
                        warn!("Failed to mirror fetch to snapshot: {e:#}");
                    }
                    *self.usage.write().unwrap() = usage;
                    self.recompute_metrics();
                    *self.last_fetch.write().unwrap() = Some(Utc::now());
                    *self.error.write().unwrap() = None;
                }
                Ok(())
            }
            Err(e) => {
                if self.is_alive() {
                    *self.error.write().unwrap() = Some(e.to_string());
                }
                Err(e)
            }
        };

        self.loading.store(false, Ordering::SeqCst);
        result
    }

    /// Re-fetch one conversation and splice it in, or the whole
    /// collection when no id is given
    ///
    /// Uses a cache-skipping read so the result is server truth, never a
    /// pre-mutation cache entry.
    pub fn refresh(&self, id: Option<&ConversationId>) -> Result<(), LcpError> {
        let Some(id) = id else {
            return self.fetch();
        };

        match self.client.get_thread_by_id(id, CacheMode::Refresh) {
            Ok(thread) => {
                if self.is_alive() {
                    self.conversations.splice_thread(thread.clone());
                    if let Err(e) = self.store.update_conversation(
                        id,
                        &ConversationPatch::thread(ThreadPatch::replace(&thread)),
                    ) {
                        warn!("Failed to mirror refresh of {id} to snapshot: {e:#}");
                    }
                    self.recompute_metrics();
                    *self.error.write().unwrap() = None;
                }
                Ok(())
            }
            Err(e) => {
                if self.is_alive() {
                    *self.error.write().unwrap() = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Apply a partial update to a thread, optimistically, then reconcile
    pub fn update(&self, id: &ConversationId, patch: ThreadPatch) -> Result<(), LcpError> {
        match self.actions.update_thread(id, &patch) {
            Ok(()) => {
                self.recompute_metrics();
                self.refresh(Some(id))
            }
            Err(e) => {
                self.repair_thread(id, &e);
                Err(e)
            }
        }
    }

    /// Delete a conversation
    pub fn delete(&self, id: &ConversationId) -> Result<(), LcpError> {
        match self.actions.delete_thread(id) {
            Ok(()) => {
                if self.is_alive() {
                    let mut selected = self.selected.write().unwrap();
                    if selected.as_ref() == Some(id) {
                        *selected = None;
                    }
                    drop(selected);
                    self.recompute_metrics();
                }
                Ok(())
            }
            Err(e) => {
                // The record was removed optimistically; a full refetch
                // resurrects it if the server still has it.
                if self.is_alive() {
                    if let Err(fetch_err) = self.fetch() {
                        warn!("Repair fetch after failed delete of {id} failed: {fetch_err}");
                    }
                    *self.error.write().unwrap() = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Mark a conversation as read
    pub fn mark_as_read(&self, id: &ConversationId) -> Result<(), LcpError> {
        self.update(id, ThreadPatch::read(true))
    }

    /// Set or clear the spam flag
    pub fn mark_as_spam(&self, id: &ConversationId, spam: bool) -> Result<(), LcpError> {
        let message_id = self
            .conversations
            .get(id)
            .and_then(|c| c.messages.iter().rev().find_map(|m| m.id.clone()));

        match self.actions.mark_spam(id, spam, message_id.as_deref()) {
            Ok(()) => {
                self.recompute_metrics();
                self.refresh(Some(id))
            }
            Err(e) => {
                self.repair_thread(id, &e);
                Err(e)
            }
        }
    }

    /// Toggle automated follow-ups; returns the new state
    pub fn toggle_lcp(&self, id: &ConversationId) -> Result<bool, LcpError> {
        match self.actions.toggle_lcp(id) {
            Ok(next) => {
                self.recompute_metrics();
                self.refresh(Some(id))?;
                Ok(next)
            }
            Err(e) => {
                self.repair_thread(id, &e);
                Err(e)
            }
        }
    }

    /// Change the usage-statistics window and refresh the metrics
    pub fn set_time_range(&self, range: TimeRange) -> Result<(), LcpError> {
        {
            let mut filters = self.filters.write().unwrap();
            if filters.time_range == range {
                return Ok(());
            }
            filters.time_range = range;
        }
        self.refresh_usage()
    }

    /// Replace the active filters; a changed time range refreshes the
    /// usage statistics
    pub fn set_filters(&self, filters: ThreadFilters) -> Result<(), LcpError> {
        let range_changed = {
            let mut current = self.filters.write().unwrap();
            let changed = current.time_range != filters.time_range;
            *current = filters;
            changed
        };
        if range_changed {
            self.refresh_usage()
        } else {
            Ok(())
        }
    }

    /// Refetch when the dashboard becomes visible and the last fetch is
    /// older than the poll period
    pub fn handle_visibility(&self, visible: bool) -> Result<(), LcpError> {
        if !visible || !self.is_alive() {
            return Ok(());
        }

        let poll_age = chrono::Duration::seconds(POLL_INTERVAL.as_secs() as i64);
        let needs_fetch = match *self.last_fetch.read().unwrap() {
            Some(at) => Utc::now() - at >= poll_age,
            None => true,
        };

        if needs_fetch {
            self.fetch()
        } else {
            Ok(())
        }
    }

    /// Stop committing state; late responses become no-ops
    pub fn teardown(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    // === Accessors ===

    /// Clone of the canonical collection
    pub fn conversations(&self) -> Vec<Conversation> {
        self.conversations.snapshot()
    }

    /// One conversation by id
    pub fn conversation(&self, id: &ConversationId) -> Option<Conversation> {
        self.conversations.get(id)
    }

    /// Filtered view for the list, newest first
    pub fn visible(&self) -> Vec<Conversation> {
        let filters = self.filters.read().unwrap().clone();
        visible_threads(&self.conversations.snapshot(), &filters)
    }

    pub fn metrics(&self) -> ThreadMetrics {
        self.metrics.read().unwrap().clone()
    }

    pub fn error(&self) -> Option<String> {
        self.error.read().unwrap().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        *self.last_fetch.read().unwrap()
    }

    pub fn filters(&self) -> ThreadFilters {
        self.filters.read().unwrap().clone()
    }

    pub fn select(&self, id: Option<ConversationId>) {
        *self.selected.write().unwrap() = id;
    }

    pub fn selected(&self) -> Option<Conversation> {
        let selected = self.selected.read().unwrap().clone();
        selected.and_then(|id| self.conversations.get(&id))
    }

    // === Internals ===

    /// Seed the collection from the snapshot if it is fresh enough
    fn hydrate(&self) -> Result<bool> {
        if self.store.is_stale(DEFAULT_MAX_AGE_MINUTES)? {
            return Ok(false);
        }
        let Some(conversations) = self.store.get_conversations()? else {
            return Ok(false);
        };

        *self.last_fetch.write().unwrap() = self.store.stats()?.last_updated;
        self.conversations.replace_all(conversations);
        self.recompute_metrics();
        Ok(true)
    }

    /// Re-derive the metrics from the collection plus server stats
    fn recompute_metrics(&self) {
        if !self.is_alive() {
            return;
        }
        let derived = derive_metrics(&self.conversations.snapshot());
        let merged = merge_usage(derived, &self.usage.read().unwrap());
        *self.metrics.write().unwrap() = merged;
    }

    /// Fetch usage statistics for the current window
    fn refresh_usage(&self) -> Result<(), LcpError> {
        let range = self.filters.read().unwrap().time_range;
        match self.client.usage_stats(range, CacheMode::Use) {
            Ok(stats) => {
                if self.is_alive() {
                    *self.usage.write().unwrap() = stats;
                    self.recompute_metrics();
                }
                Ok(())
            }
            Err(e) => {
                if self.is_alive() {
                    *self.error.write().unwrap() = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Repair after a failed single-thread mutation: refetch server truth
    /// over the optimistic patch, then surface the original failure
    fn repair_thread(&self, id: &ConversationId, failure: &LcpError) {
        if !self.is_alive() {
            return;
        }
        if let Err(e) = self.refresh(Some(id)) {
            warn!("Repair refetch for {id} failed: {e}");
        }
        *self.error.write().unwrap() = Some(failure.to_string());
    }
}
