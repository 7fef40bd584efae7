//! Error types for backend calls and session storage.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while talking to the backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend rejected the credential (401/403) on an authenticated
    /// call. The session has already been cleared when this is returned.
    #[error("session expired, log in again")]
    AuthExpired,

    /// An authenticated call was attempted without a live session.
    #[error("not logged in")]
    NotAuthenticated,

    /// Server returned a non-success status.
    #[error("request failed ({status}): {message}")]
    Request { status: u16, message: String },

    /// Transport failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Input rejected locally; no request was sent.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Persisted session could not be read or written.
    #[error("session storage: {0}")]
    Storage(#[from] StorageError),
}

impl ClientError {
    /// Whether this is the forced-logout condition.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ClientError::AuthExpired)
    }

    /// Whether this is a network, server or decode failure.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            ClientError::Request { .. } | ClientError::Http(_) | ClientError::Decode(_)
        )
    }

    /// HTTP status of a server-side failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Request { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ClientError::Validation(message.into())
    }
}

/// Errors from the persisted session store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored session is not valid JSON.
    #[error("corrupt session data: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// FastAPI error body: `{"detail": "..."}` or a list of validation items.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Extract a human-readable message from an error response body.
pub(crate) fn message_from_body(status: StatusCode, body: &str) -> String {
    if let Ok(ErrorBody { detail }) = serde_json::from_str::<ErrorBody>(body) {
        match detail {
            serde_json::Value::String(text) if !text.is_empty() => return text,
            serde_json::Value::Array(items) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                    .collect();
                if !messages.is_empty() {
                    return messages.join("; ");
                }
            }
            serde_json::Value::Null => {}
            other => return other.to_string(),
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_string() {
        let msg = message_from_body(StatusCode::NOT_FOUND, r#"{"detail":"Query not found"}"#);
        assert_eq!(msg, "Query not found");
    }

    #[test]
    fn test_detail_validation_list() {
        let body = r#"{"detail":[{"loc":["body","username"],"msg":"field required"},{"msg":"too short"}]}"#;
        let msg = message_from_body(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(msg, "field required; too short");
    }

    #[test]
    fn test_plain_body_and_empty_body() {
        assert_eq!(
            message_from_body(StatusCode::BAD_GATEWAY, "upstream down\n"),
            "upstream down"
        );
        assert_eq!(
            message_from_body(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
    }

    #[test]
    fn test_classification() {
        assert!(ClientError::AuthExpired.is_auth_expired());
        assert!(!ClientError::AuthExpired.is_request_error());

        let err = ClientError::Request {
            status: 500,
            message: "boom".into(),
        };
        assert!(err.is_request_error());
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "request failed (500): boom");

        assert!(!ClientError::validation("empty").is_request_error());
    }
}
