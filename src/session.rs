//! Session token access.
//!
//! The backend authenticates every call with a bearer token issued by an
//! external session mechanism. The transport asks a [`SessionAccessor`] for
//! the current token on every request, so rotated or expired tokens are
//! picked up without restarting the client.

use async_trait::async_trait;

/// Environment variable checked by [`EnvSession`].
pub const TOKEN_ENV_VAR: &str = "CLINICA_TOKEN";

/// Supplies the bearer token for outgoing requests.
///
/// Returning `None` means "no session": the transport fails fast with
/// `ApiError::Unauthenticated` instead of issuing a request the backend
/// would reject anyway.
#[async_trait]
pub trait SessionAccessor: Send + Sync {
  /// The current bearer token, if a session exists.
  async fn token(&self) -> Option<String>;
}

/// Accessor backed by a fixed token, handed over at construction.
#[derive(Debug, Clone)]
pub struct StaticSession {
  token: String,
}

impl StaticSession {
  pub fn new(token: impl Into<String>) -> Self {
    Self {
      token: token.into(),
    }
  }
}

#[async_trait]
impl SessionAccessor for StaticSession {
  async fn token(&self) -> Option<String> {
    Some(self.token.clone())
  }
}

/// Accessor that reads the token from the `CLINICA_TOKEN` environment
/// variable on every call.
#[derive(Debug, Clone, Default)]
pub struct EnvSession;

#[async_trait]
impl SessionAccessor for EnvSession {
  async fn token(&self) -> Option<String> {
    std::env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty())
  }
}

/// Accessor that never has a token. Useful in tests for the fail-fast path.
#[derive(Debug, Clone, Default)]
pub struct NoSession;

#[async_trait]
impl SessionAccessor for NoSession {
  async fn token(&self) -> Option<String> {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_static_session_returns_token() {
    let session = StaticSession::new("abc123");
    assert_eq!(session.token().await.as_deref(), Some("abc123"));
  }

  #[tokio::test]
  async fn test_no_session_returns_none() {
    assert_eq!(NoSession.token().await, None);
  }
}
