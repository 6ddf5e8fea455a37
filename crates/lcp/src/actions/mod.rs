//! Optimistic mutation handling for conversation operations

mod handler;

pub use handler::ActionHandler;
