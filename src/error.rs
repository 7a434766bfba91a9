//! Error types surfaced by the client.

use thiserror::Error;

/// Maximum number of characters of a raw error body embedded in a message.
const RAW_BODY_LIMIT: usize = 200;

/// Errors produced by the transport and everything built on top of it.
///
/// `Unauthenticated`, `NotFound` and `Timeout` are split out so callers can
/// branch on them (redirect to login, render an empty state, retry). Everything
/// else lands in `Api`, `Network` or `Decode`.
///
/// The enum is `Clone` because a single failed fetch may be shared between
/// several concurrent callers awaiting the same in-flight request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
  /// No session token available, or the backend answered 401.
  #[error("not authenticated: {0}")]
  Unauthenticated(String),

  /// The backend answered 404 for a single-entity fetch.
  #[error("not found: {0}")]
  NotFound(String),

  /// The request exceeded the configured timeout.
  #[error("request timed out after {0} ms")]
  Timeout(u64),

  /// Any other non-2xx response from the backend.
  #[error("backend error (HTTP {status}): {message}")]
  Api { status: u16, message: String },

  /// Connection-level failure: DNS, refused connection, TLS, ...
  #[error("network error: {0}")]
  Network(String),

  /// The response body could not be decoded as the expected shape.
  #[error("failed to decode response: {0}")]
  Decode(String),
}

impl ApiError {
  /// Classify a non-2xx response into the error taxonomy.
  ///
  /// Prefers the `message` field of a JSON error body; falls back to a
  /// templated message embedding the status and a truncated raw body.
  pub fn from_response(status: u16, raw_body: &str) -> Self {
    let message = serde_json::from_str::<serde_json::Value>(raw_body)
      .ok()
      .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
      .unwrap_or_else(|| format!("HTTP error {}: {}", status, truncate(raw_body, RAW_BODY_LIMIT)));

    match status {
      401 => ApiError::Unauthenticated(message),
      404 => ApiError::NotFound(message),
      _ => ApiError::Api { status, message },
    }
  }

  /// The HTTP status associated with this error, if any.
  pub fn http_status(&self) -> Option<u16> {
    match self {
      ApiError::Unauthenticated(_) => Some(401),
      ApiError::NotFound(_) => Some(404),
      ApiError::Api { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn is_unauthenticated(&self) -> bool {
    matches!(self, ApiError::Unauthenticated(_))
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, ApiError::NotFound(_))
  }

  pub fn is_timeout(&self) -> bool {
    matches!(self, ApiError::Timeout(_))
  }
}

/// Truncate to at most `limit` characters, respecting char boundaries.
fn truncate(s: &str, limit: usize) -> &str {
  match s.char_indices().nth(limit) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}
