//! Typed errors for the CRM API layer

/// Error returned by the request gateway and the typed client
///
/// Four classes, mapped from the HTTP outcome:
/// - [`Auth`](LcpError::Auth): 401/403, the session must re-authenticate
/// - [`Api`](LcpError::Api): any other non-2xx, or an envelope with
///   `success: false`, carrying the server's message
/// - [`Network`](LcpError::Network): transport or parse failure
/// - [`Unknown`](LcpError::Unknown): anything uncategorized
///
/// `Clone` is required so coalesced callers can each receive the shared
/// outcome of a single in-flight request. Nothing here retries; callers
/// recover through the next fetch/refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LcpError {
    #[error("authentication failed (HTTP {status})")]
    Auth { status: u16 },

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl LcpError {
    /// Classify an HTTP status code with its (already parsed) body
    pub fn from_status(status: u16, body: &serde_json::Value) -> Self {
        match status {
            401 | 403 => Self::Auth { status },
            _ => Self::Api {
                status,
                message: extract_message(body),
            },
        }
    }

    /// True for the 401/403 class
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Pull a human-readable message out of an error body
///
/// Accepts the `{ "error": ... }` and `{ "message": ... }` shapes the CRM
/// service produces; falls back to the raw body.
fn extract_message(body: &serde_json::Value) -> String {
    for key in ["error", "message"] {
        if let Some(msg) = body.get(key).and_then(|v| v.as_str()) {
            return msg.to_string();
        }
    }
    match body {
        serde_json::Value::Null => "no error body".to_string(),
        other => {
            let raw = other.to_string();
            match raw.char_indices().nth(200) {
                Some((idx, _)) => format!("{}...", &raw[..idx]),
                None => raw,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_classification() {
        assert!(LcpError::from_status(401, &serde_json::Value::Null).is_auth());
        assert!(LcpError::from_status(403, &serde_json::Value::Null).is_auth());
        assert!(!LcpError::from_status(404, &serde_json::Value::Null).is_auth());
    }

    #[test]
    fn test_api_error_carries_message() {
        let err = LcpError::from_status(500, &json!({"error": "db unavailable"}));
        assert_eq!(
            err,
            LcpError::Api {
                status: 500,
                message: "db unavailable".to_string()
            }
        );
    }

    #[test]
    fn test_message_fallback_to_raw_body() {
        let err = LcpError::from_status(404, &json!({"detail": 42}));
        match err {
            LcpError::Api { status, message } => {
                assert_eq!(status, 404);
                assert!(message.contains("detail"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
