//! LCP crate - conversation synchronization core for the Leadline CRM
//!
//! This crate provides the dashboard-independent conversation layer:
//! - Domain models (Thread, Message, Conversation, metrics)
//! - Request gateway with throttling, caching, and request coalescing
//! - Typed client for the CRM thread endpoints
//! - Per-user snapshot storage (in-memory and SQLite)
//! - Optimistic mutation handling with refetch-based reconciliation
//! - Session state aggregation, metric derivation, and background polling
//!
//! This crate has zero UI dependencies; the dashboard consumes it through
//! [`ThreadsState`] and the query functions.

pub mod actions;
pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod query;
pub mod state;
pub mod storage;

pub use actions::ActionHandler;
pub use api::{
    CacheMode, FnTransport, LcpClient, RequestGateway, Transport, TransportError,
    TransportResponse, UreqTransport, CACHE_TTL, THROTTLE_INTERVAL,
};
pub use config::ApiConfig;
pub use error::LcpError;
pub use metrics::{derive_metrics, merge_usage};
pub use models::{
    Conversation, ConversationId, ConversationPatch, Message, MessageKind, Thread, ThreadMetrics,
    ThreadPatch, UsageStats,
};
pub use query::{filter_threads, visible_threads, ThreadFilters, TimeRange};
pub use state::{
    AlwaysVisible, ConversationSet, Poller, ThreadsState, VisibilityProbe, POLL_INTERVAL,
};
pub use storage::{
    InMemorySnapshotStore, SnapshotStats, SnapshotStore, SqliteSnapshotStore,
    DEFAULT_MAX_AGE_MINUTES,
};
