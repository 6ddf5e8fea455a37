//! CRM API access: transport, request gateway, and typed client

mod client;
mod gateway;
mod transport;
pub mod types;

pub use client::LcpClient;
pub use gateway::{CacheMode, RequestGateway, CACHE_TTL, THROTTLE_INTERVAL};
pub use transport::{FnTransport, Transport, TransportError, TransportResponse, UreqTransport};
