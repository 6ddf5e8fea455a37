//! Derived views over the conversation collection

mod threads;

pub use threads::{filter_threads, visible_threads, ThreadFilters, TimeRange};
