//! Wire types for the CRM JSON endpoints
//!
//! Field spellings here are load-bearing: they must match the service
//! exactly, casing included.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Standard `{ success, data }` response envelope
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST lcp/get_all_threads`
#[derive(Debug, Serialize)]
pub struct GetAllThreadsBody<'a> {
    #[serde(rename = "userId")]
    pub user_id: &'a str,
}

/// Body of `POST lcp/getThreadById`
#[derive(Debug, Serialize)]
pub struct GetThreadByIdBody<'a> {
    pub conversation_id: &'a str,
}

/// Body of `POST db/update`: a generic keyed partial update
#[derive(Debug, Serialize)]
pub struct DbUpdateBody<'a> {
    pub table_name: &'a str,
    pub index_name: &'a str,
    pub key_name: &'a str,
    pub key_value: &'a str,
    pub update_data: Value,
}

/// Body of `POST lcp/delete_thread`
#[derive(Debug, Serialize)]
pub struct DeleteThreadBody<'a> {
    #[serde(rename = "conversationId")]
    pub conversation_id: &'a str,
}

/// Body of `POST lcp/mark_not_spam`
#[derive(Debug, Serialize)]
pub struct MarkNotSpamBody<'a> {
    #[serde(rename = "conversationId")]
    pub conversation_id: &'a str,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<&'a str>,
}
