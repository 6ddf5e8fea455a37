//! Request gateway: throttling, response caching, and request coalescing
//!
//! Every call to the CRM service goes through one gateway instance. The
//! gateway enforces a global minimum spacing between requests (the service
//! rate limit is shared across endpoints), serves repeat reads from a
//! short-lived response cache, and collapses concurrent identical requests
//! into a single network round trip whose outcome every caller shares.
//!
//! The gateway owns transient bookkeeping only; domain semantics live in
//! the typed client and above.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;

use super::transport::Transport;
use crate::error::LcpError;

/// Minimum spacing between any two requests, across all keys
pub const THROTTLE_INTERVAL: Duration = Duration::from_secs(1);

/// How long a cached response stays valid
pub const CACHE_TTL: Duration = Duration::from_secs(30);

/// How a request interacts with the response cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Serve from cache when valid, store the response on success
    Use,
    /// Skip the cache read but store the fresh response; used by
    /// reconciling re-fetches so they can never be satisfied by a
    /// pre-mutation entry
    Refresh,
    /// Never read or store; used by mutations
    Bypass,
}

/// A cached response payload
struct CacheEntry {
    payload: Value,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_valid(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// Shared outcome slot for one in-flight request
///
/// The leader publishes the result here; every coalesced caller blocks on
/// the condvar and receives a clone.
#[derive(Default)]
struct InFlight {
    outcome: Mutex<Option<Result<Value, LcpError>>>,
    done: Condvar,
}

impl InFlight {
    fn wait(&self) -> Result<Value, LcpError> {
        let mut guard = self.outcome.lock().unwrap();
        while guard.is_none() {
            guard = self.done.wait(guard).unwrap();
        }
        guard.clone().expect("outcome published")
    }

    fn publish(&self, result: Result<Value, LcpError>) {
        let mut guard = self.outcome.lock().unwrap();
        *guard = Some(result);
        self.done.notify_all();
    }
}

/// Gateway for all CRM service requests
pub struct RequestGateway {
    transport: Arc<dyn Transport>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    pending: Mutex<HashMap<String, Arc<InFlight>>>,
    /// Earliest start time reserved for the next request
    next_slot: Mutex<Option<Instant>>,
    cache_ttl: Duration,
    throttle_interval: Duration,
}

impl RequestGateway {
    /// Create a gateway with the production TTL and throttle interval
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_timing(transport, CACHE_TTL, THROTTLE_INTERVAL)
    }

    /// Create a gateway with explicit timing, for tests and tuning
    pub fn with_timing(
        transport: Arc<dyn Transport>,
        cache_ttl: Duration,
        throttle_interval: Duration,
    ) -> Self {
        Self {
            transport,
            cache: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            next_slot: Mutex::new(None),
            cache_ttl,
            throttle_interval,
        }
    }

    /// Issue a request, honoring the cache mode
    ///
    /// Concurrent calls with an identical (method, endpoint, body) key
    /// share one network round trip and one outcome, success or failure.
    pub fn request(
        &self,
        method: &str,
        endpoint: &str,
        body: Option<&Value>,
        mode: CacheMode,
    ) -> Result<Value, LcpError> {
        let key = cache_key(method, endpoint, body);

        if mode == CacheMode::Use {
            if let Some(hit) = self.cache_lookup(&key) {
                log::debug!("[GATEWAY] cache hit for {method} {endpoint}");
                return Ok(hit);
            }
        }

        let (inflight, leader) = {
            let mut pending = self.pending.lock().unwrap();
            match pending.get(&key) {
                Some(existing) => (Arc::clone(existing), false),
                None => {
                    let fresh = Arc::new(InFlight::default());
                    pending.insert(key.clone(), Arc::clone(&fresh));
                    (fresh, true)
                }
            }
        };

        if !leader {
            log::debug!("[GATEWAY] joining in-flight request for {method} {endpoint}");
            return inflight.wait();
        }

        let result = self.perform(method, endpoint, body, &key, mode);

        // Unregister before publishing: once the outcome is visible the
        // key no longer has an in-flight request to join.
        self.pending.lock().unwrap().remove(&key);
        inflight.publish(result.clone());

        result
    }

    /// Drop every cached response
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }

    fn cache_lookup(&self, key: &str) -> Option<Value> {
        let cache = self.cache.lock().unwrap();
        cache
            .get(key)
            .filter(|entry| entry.is_valid(self.cache_ttl))
            .map(|entry| entry.payload.clone())
    }

    fn perform(
        &self,
        method: &str,
        endpoint: &str,
        body: Option<&Value>,
        key: &str,
        mode: CacheMode,
    ) -> Result<Value, LcpError> {
        self.throttle();

        let response = self
            .transport
            .execute(method, endpoint, body)
            .map_err(|e| LcpError::Network(e.0))?;

        if !(200..300).contains(&response.status) {
            return Err(LcpError::from_status(response.status, &response.body));
        }

        if mode != CacheMode::Bypass {
            // Expired entries are superseded here rather than swept; a
            // stale entry that is never re-requested just sits ignored.
            let mut cache = self.cache.lock().unwrap();
            cache.insert(
                key.to_string(),
                CacheEntry {
                    payload: response.body.clone(),
                    stored_at: Instant::now(),
                },
            );
        }

        Ok(response.body)
    }

    /// Reserve the next request slot and sleep until it arrives
    ///
    /// Slots are spaced `throttle_interval` apart globally, not per key.
    fn throttle(&self) {
        let slot = {
            let mut next = self.next_slot.lock().unwrap();
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.throttle_interval);
            slot
        };

        let now = Instant::now();
        if slot > now {
            std::thread::sleep(slot - now);
        }
    }
}

/// Canonical cache key for a request
fn cache_key(method: &str, endpoint: &str, body: Option<&Value>) -> String {
    match body {
        Some(json) => format!("{method} {endpoint} {json}"),
        None => format!("{method} {endpoint}"),
    }
}
