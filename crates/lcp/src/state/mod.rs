//! Session state: the canonical conversation collection, its owning
//! store, and the background refresh scheduler

mod collection;
mod poller;
mod threads;

pub use collection::ConversationSet;
pub use poller::{AlwaysVisible, Poller, VisibilityProbe, POLL_INTERVAL};
pub use threads::ThreadsState;
