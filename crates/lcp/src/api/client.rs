//! Typed client for the CRM thread endpoints
//!
//! One method per endpoint, each going through the request gateway. This
//! layer owns the envelope handling and wire shapes; it holds no state.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::gateway::{CacheMode, RequestGateway};
use super::types::{
    ApiEnvelope, DbUpdateBody, DeleteThreadBody, GetAllThreadsBody, GetThreadByIdBody,
    MarkNotSpamBody,
};
use crate::error::LcpError;
use crate::models::{Conversation, ConversationId, Thread, ThreadPatch, UsageStats};
use crate::query::TimeRange;

/// Typed access to the CRM conversation API
pub struct LcpClient {
    gateway: Arc<RequestGateway>,
}

impl LcpClient {
    /// Keyed-update routing for the thread table
    const THREADS_TABLE: &'static str = "threads";
    const THREADS_INDEX: &'static str = "conversation_id-index";
    const THREADS_KEY: &'static str = "conversation_id";

    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }

    /// The underlying gateway (for cache control)
    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    /// Fetch every conversation for a user
    pub fn get_all_threads(
        &self,
        user_id: &str,
        mode: CacheMode,
    ) -> Result<Vec<Conversation>, LcpError> {
        let body = encode(&GetAllThreadsBody { user_id })?;
        let value = self
            .gateway
            .request("POST", "lcp/get_all_threads", Some(&body), mode)?;

        let mut conversations: Vec<Conversation> = decode(value)?;
        for conversation in &mut conversations {
            conversation.messages.sort_by_key(|m| m.timestamp);
        }
        Ok(conversations)
    }

    /// Fetch a single thread's current server state
    pub fn get_thread_by_id(
        &self,
        id: &ConversationId,
        mode: CacheMode,
    ) -> Result<Thread, LcpError> {
        let body = encode(&GetThreadByIdBody {
            conversation_id: id.as_str(),
        })?;
        let value = self
            .gateway
            .request("POST", "lcp/getThreadById", Some(&body), mode)?;
        decode(value)
    }

    /// Apply a partial update to a thread via the generic keyed update
    pub fn update_thread(&self, id: &ConversationId, patch: &ThreadPatch) -> Result<(), LcpError> {
        let update_data = serde_json::to_value(patch)
            .map_err(|e| LcpError::Unknown(format!("failed to encode patch: {e}")))?;
        let body = encode(&DbUpdateBody {
            table_name: Self::THREADS_TABLE,
            index_name: Self::THREADS_INDEX,
            key_name: Self::THREADS_KEY,
            key_value: id.as_str(),
            update_data,
        })?;

        let value = self
            .gateway
            .request("POST", "db/update", Some(&body), CacheMode::Bypass)?;
        decode_ack(value)
    }

    /// Delete a thread
    pub fn delete_thread(&self, id: &ConversationId) -> Result<(), LcpError> {
        let body = encode(&DeleteThreadBody {
            conversation_id: id.as_str(),
        })?;
        let value = self
            .gateway
            .request("POST", "lcp/delete_thread", Some(&body), CacheMode::Bypass)?;
        decode_ack(value)
    }

    /// Clear a spam flag server-side
    pub fn mark_not_spam(
        &self,
        id: &ConversationId,
        message_id: Option<&str>,
    ) -> Result<(), LcpError> {
        let body = encode(&MarkNotSpamBody {
            conversation_id: id.as_str(),
            message_id,
        })?;
        let value = self
            .gateway
            .request("POST", "lcp/mark_not_spam", Some(&body), CacheMode::Bypass)?;
        decode_ack(value)
    }

    /// Fetch server-side usage statistics for a time range
    pub fn usage_stats(&self, range: TimeRange, mode: CacheMode) -> Result<UsageStats, LcpError> {
        let endpoint = format!("usage/stats?timeRange={}", range.as_str());
        let value = self.gateway.request("GET", &endpoint, None, mode)?;
        decode(value)
    }
}

fn encode<T: serde::Serialize>(body: &T) -> Result<Value, LcpError> {
    serde_json::to_value(body)
        .map_err(|e| LcpError::Unknown(format!("failed to encode request body: {e}")))
}

/// Unwrap a `{ success, data }` envelope into its payload
fn decode<T: DeserializeOwned>(value: Value) -> Result<T, LcpError> {
    let envelope: ApiEnvelope<T> = serde_json::from_value(value)
        .map_err(|e| LcpError::Network(format!("malformed response envelope: {e}")))?;

    if !envelope.success {
        return Err(LcpError::Api {
            status: 200,
            message: envelope
                .error
                .unwrap_or_else(|| "request reported failure".to_string()),
        });
    }

    envelope
        .data
        .ok_or_else(|| LcpError::Network("response envelope missing data".to_string()))
}

/// Check a mutation acknowledgement, which may carry no data
fn decode_ack(value: Value) -> Result<(), LcpError> {
    let envelope: ApiEnvelope<Value> = serde_json::from_value(value)
        .map_err(|e| LcpError::Network(format!("malformed response envelope: {e}")))?;

    if !envelope.success {
        return Err(LcpError::Api {
            status: 200,
            message: envelope
                .error
                .unwrap_or_else(|| "request reported failure".to_string()),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::{FnTransport, TransportResponse};
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    fn make_client(transport: Arc<FnTransport>) -> LcpClient {
        let gateway = Arc::new(RequestGateway::with_timing(
            transport,
            Duration::from_secs(60),
            Duration::ZERO,
        ));
        LcpClient::new(gateway)
    }

    fn thread_json(id: &str) -> Value {
        json!({
            "conversation_id": id,
            "read": false,
            "created_at": Utc::now().to_rfc3339(),
            "last_updated": Utc::now().to_rfc3339(),
        })
    }

    #[test]
    fn test_get_all_threads_hits_expected_endpoint() {
        let transport = Arc::new(FnTransport::new(|method, endpoint, body| {
            assert_eq!(method, "POST");
            assert_eq!(endpoint, "lcp/get_all_threads");
            assert_eq!(body.unwrap()["userId"], "u1");
            Ok(TransportResponse::ok(json!({
                "success": true,
                "data": [{"thread": thread_json("c1"), "messages": []}],
            })))
        }));

        let client = make_client(transport);
        let conversations = client.get_all_threads("u1", CacheMode::Use).unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].id().as_str(), "c1");
    }

    #[test]
    fn test_get_thread_by_id() {
        let transport = Arc::new(FnTransport::new(|_, endpoint, body| {
            assert_eq!(endpoint, "lcp/getThreadById");
            assert_eq!(body.unwrap()["conversation_id"], "c2");
            Ok(TransportResponse::ok(json!({
                "success": true,
                "data": thread_json("c2"),
            })))
        }));

        let client = make_client(transport);
        let thread = client
            .get_thread_by_id(&ConversationId::new("c2"), CacheMode::Refresh)
            .unwrap();
        assert_eq!(thread.conversation_id.as_str(), "c2");
    }

    #[test]
    fn test_update_thread_sends_keyed_partial_update() {
        let transport = Arc::new(FnTransport::new(|_, endpoint, body| {
            assert_eq!(endpoint, "db/update");
            let body = body.unwrap();
            assert_eq!(body["table_name"], "threads");
            assert_eq!(body["key_name"], "conversation_id");
            assert_eq!(body["key_value"], "c3");
            // Only the touched field travels
            assert_eq!(body["update_data"], json!({"read": true}));
            Ok(TransportResponse::ok(json!({"success": true})))
        }));

        let client = make_client(transport);
        client
            .update_thread(
                &ConversationId::new("c3"),
                &crate::models::ThreadPatch::read(true),
            )
            .unwrap();
    }

    #[test]
    fn test_envelope_failure_maps_to_api_error() {
        let transport = Arc::new(FnTransport::new(|_, _, _| {
            Ok(TransportResponse::ok(json!({
                "success": false,
                "error": "conversation not found",
            })))
        }));

        let client = make_client(transport);
        let err = client
            .get_thread_by_id(&ConversationId::new("missing"), CacheMode::Use)
            .unwrap_err();
        assert_eq!(
            err,
            LcpError::Api {
                status: 200,
                message: "conversation not found".to_string()
            }
        );
    }

    #[test]
    fn test_usage_stats_query_string() {
        let transport = Arc::new(FnTransport::new(|method, endpoint, body| {
            assert_eq!(method, "GET");
            assert_eq!(endpoint, "usage/stats?timeRange=week");
            assert!(body.is_none());
            Ok(TransportResponse::ok(json!({
                "success": true,
                "data": {"conversionRate": 25.0},
            })))
        }));

        let client = make_client(transport);
        let stats = client.usage_stats(TimeRange::Week, CacheMode::Use).unwrap();
        assert_eq!(stats.conversion_rate, Some(25.0));
    }

    #[test]
    fn test_messages_sorted_on_fetch() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::minutes(5);
        let transport = Arc::new(FnTransport::new(move |_, _, _| {
            Ok(TransportResponse::ok(json!({
                "success": true,
                "data": [{
                    "thread": thread_json("c1"),
                    "messages": [
                        {"conversation_id": "c1", "type": "outbound", "content": "second",
                         "timestamp": now.to_rfc3339()},
                        {"conversation_id": "c1", "type": "inbound", "content": "first",
                         "timestamp": earlier.to_rfc3339()},
                    ],
                }],
            })))
        }));

        let client = make_client(transport);
        let conversations = client.get_all_threads("u1", CacheMode::Use).unwrap();
        assert_eq!(conversations[0].messages[0].content, "first");
        assert_eq!(conversations[0].messages[1].content, "second");
    }
}
