//! # Error Handling
//!
//! Client-side error taxonomy for the clinic API. Server failures are parsed
//! from their problem-style JSON body where possible so callers always get an
//! HTTP status plus a human-readable message.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::TokenStoreError;

/// Maximum number of characters of a non-JSON error body kept in messages.
const BODY_SNIPPET_CHARS: usize = 200;

/// Error body returned by the API on non-2xx responses.
///
/// Mirrors the `{code, message, details, trace_id}` problem shape; the
/// legacy `{error}` and `{detail}` shapes are folded into `message`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

impl ErrorBody {
    /// Best human-readable message carried by the body, if any.
    pub fn best_message(&self) -> Option<String> {
        if let Some(message) = self.message.as_deref().filter(|m| !m.trim().is_empty()) {
            return Some(message.to_string());
        }
        [self.error.as_ref(), self.detail.as_ref()]
            .into_iter()
            .flatten()
            .find_map(value_message)
    }
}

fn value_message(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
        _ => None,
    }
}

/// Coarse classification used by callers deciding how to surface a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response at all (DNS, connect, reset).
    Transport,
    /// The server answered with a non-2xx status.
    Http,
    /// Client-side form checks rejected the input before any request.
    Validation,
    /// No session is available for an operation that needs one.
    Auth,
    /// The response body could not be decoded into the expected shape.
    Decode,
    /// A timeout-bounded operation did not finish in time.
    Timeout,
    /// Local configuration or storage failure.
    Local,
}

/// Per-field validation messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for `field`. The first message for a field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| message.into());
    }

    /// Merge a single field check into the collection.
    pub fn check(&mut self, field: &str, result: Result<(), String>) {
        if let Err(message) = result {
            self.add(field, message);
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn into_result(self) -> Result<(), ClientError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Errors raised by the clinic API client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed with status {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: Option<Box<ErrorBody>>,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("no active session; log in first")]
    NotAuthenticated,

    #[error("token store error: {0}")]
    TokenStore(#[from] TokenStoreError),
}

impl ClientError {
    /// Build an HTTP error from a status and the raw response body.
    pub fn from_response(status: StatusCode, raw_body: &str) -> Self {
        let parsed = serde_json::from_str::<ErrorBody>(raw_body).ok();
        let message = parsed
            .as_ref()
            .and_then(ErrorBody::best_message)
            .or_else(|| body_snippet(raw_body))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unknown status")
                    .to_string()
            });

        ClientError::Http {
            status: status.as_u16(),
            message,
            body: parsed.map(Box::new),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Http { .. } => ErrorKind::Http,
            ClientError::Network(_) => ErrorKind::Transport,
            ClientError::Timeout(_) => ErrorKind::Timeout,
            ClientError::Decode(_) => ErrorKind::Decode,
            ClientError::Validation(_) => ErrorKind::Validation,
            ClientError::NotAuthenticated => ErrorKind::Auth,
            ClientError::Url(_) | ClientError::TokenStore(_) => ErrorKind::Local,
        }
    }

    /// HTTP status, when the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Short message suitable for an inline error banner or toast.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Http {
                status, message, ..
            } => format!("Request failed ({status}): {message}"),
            ClientError::Network(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            ClientError::Timeout(after) => {
                format!("The request took too long (over {}s).", after.as_secs())
            }
            ClientError::Decode(_) => "The server sent an unexpected response.".to_string(),
            ClientError::Validation(errors) => format!("Please fix the highlighted fields: {errors}"),
            ClientError::NotAuthenticated => "Your session has ended. Please log in again.".to_string(),
            ClientError::Url(err) => format!("Invalid address: {err}"),
            ClientError::TokenStore(err) => format!("Could not access the saved session: {err}"),
        }
    }
}

/// UTF-8 safe truncation of a plain-text error body.
fn body_snippet(raw_body: &str) -> Option<String> {
    let trimmed = raw_body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() > BODY_SNIPPET_CHARS {
        let truncated: String = trimmed.chars().take(BODY_SNIPPET_CHARS).collect();
        Some(format!("{truncated}..."))
    } else {
        Some(trimmed.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
