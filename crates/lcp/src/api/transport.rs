//! HTTP transport abstraction
//!
//! The gateway talks to the network through the [`Transport`] trait so
//! tests can inject scripted transports. [`UreqTransport`] is the real
//! implementation, using synchronous HTTP (ureq) to be executor-agnostic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;
use ureq::Agent;
use url::Url;

/// A raw HTTP outcome: status plus parsed JSON body
///
/// Non-2xx statuses are returned here too; classification into typed
/// errors happens in the gateway.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

impl TransportResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn with_status(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

/// Connection-level failure (DNS, refused, timeout, undecodable body)
#[derive(Debug, Clone, thiserror::Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Trait for issuing a single HTTP request
pub trait Transport: Send + Sync {
    /// Execute `method endpoint` with an optional JSON body
    ///
    /// `endpoint` is relative (e.g. `lcp/get_all_threads`, possibly with a
    /// query string); the implementation resolves it against its base URL.
    fn execute(
        &self,
        method: &str,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<TransportResponse, TransportError>;
}

/// Transport over ureq
pub struct UreqTransport {
    agent: Agent,
    base_url: Url,
    api_key: Option<String>,
}

impl UreqTransport {
    /// Default per-request timeout
    const TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a transport for the given API base URL
    ///
    /// `api_key`, when present, is sent as a bearer token.
    pub fn new(base_url: Url, api_key: Option<String>) -> Self {
        // Status errors are disabled so 4xx/5xx bodies stay readable; the
        // gateway does its own classification.
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Self::TIMEOUT))
            .build()
            .new_agent();

        Self {
            agent,
            base_url,
            api_key,
        }
    }

    fn resolve(&self, endpoint: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(endpoint)
            .map_err(|e| TransportError(format!("invalid endpoint {endpoint}: {e}")))
    }
}

impl Transport for UreqTransport {
    fn execute(
        &self,
        method: &str,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<TransportResponse, TransportError> {
        let url = self.resolve(endpoint)?;
        let auth = self
            .api_key
            .as_ref()
            .map(|key| format!("Bearer {key}"));

        // GET and POST builders are distinct ureq types, so each arm runs
        // to completion on its own.
        let result = if method == "GET" {
            let mut request = self.agent.get(url.as_str());
            if let Some(auth) = &auth {
                request = request.header("Authorization", auth);
            }
            request.call()
        } else {
            let mut request = self.agent.post(url.as_str());
            if let Some(auth) = &auth {
                request = request.header("Authorization", auth);
            }
            match body {
                Some(json) => request.send_json(json),
                None => request.send_empty(),
            }
        };

        let mut response = result.map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError(format!("failed to read response body: {e}")))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| TransportError(format!("malformed JSON response: {e}")))?
        };

        Ok(TransportResponse { status, body })
    }
}

/// Transport backed by a handler closure
///
/// Used for tests and offline stubs: the handler receives the method,
/// endpoint, and body of each request and decides the outcome. Calls are
/// counted so tests can assert how many requests actually went out.
pub struct FnTransport {
    handler: Box<
        dyn Fn(&str, &str, Option<&Value>) -> Result<TransportResponse, TransportError>
            + Send
            + Sync,
    >,
    calls: AtomicUsize,
}

impl FnTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &str, Option<&Value>) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of requests that reached this transport
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for FnTransport {
    fn execute(
        &self,
        method: &str,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(method, endpoint, body)
    }
}
