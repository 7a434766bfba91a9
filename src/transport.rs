//! HTTP transport for the backend API.
//!
//! [`HttpTransport`] owns the `reqwest` client, resolves the bearer token
//! through a [`SessionAccessor`] on every call, and normalizes every failure
//! into an [`ApiError`]. Everything above it works with decoded
//! `serde_json::Value` payloads and never touches HTTP directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::{Config, ConfigError};
use crate::error::ApiError;
use crate::session::SessionAccessor;

/// Query parameters and body for a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
  pub query: Vec<(String, String)>,
  pub body: Option<Value>,
}

impl RequestOptions {
  pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.query.push((key.into(), value.into()));
    self
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }
}

/// Issues authenticated requests against the backend.
///
/// The trait exists so the resource clients can be exercised against an
/// in-memory implementation in tests; production code uses [`HttpTransport`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
  /// Perform a request and decode the response body as JSON.
  ///
  /// An empty 2xx body decodes to `Value::Null`.
  async fn request(
    &self,
    method: Method,
    path: &str,
    options: RequestOptions,
  ) -> Result<Value, ApiError>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
  http: reqwest::Client,
  base_url: Url,
  session: Arc<dyn SessionAccessor>,
  timeout: Duration,
}

impl HttpTransport {
  pub fn new(config: &Config, session: Arc<dyn SessionAccessor>) -> Result<Self, ConfigError> {
    let base_url = parse_base_url(&config.backend.url)?;

    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| ConfigError::Http(e.to_string()))?;

    Ok(Self {
      http,
      base_url,
      session,
      timeout: config.request_timeout(),
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| ApiError::Network(format!("invalid request path {:?}: {}", path, e)))
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn request(
    &self,
    method: Method,
    path: &str,
    options: RequestOptions,
  ) -> Result<Value, ApiError> {
    // Fail fast when there is no session: the backend would reject the call
    // with 401 anyway, so skip the round-trip.
    let token = self
      .session
      .token()
      .await
      .ok_or_else(|| ApiError::Unauthenticated("no session token available".to_string()))?;

    let url = self.endpoint(path)?;
    debug!(%method, path, "sending request");

    let mut request = self
      .http
      .request(method.clone(), url)
      .timeout(self.timeout)
      .bearer_auth(&token);

    let query: Vec<_> = options
      .query
      .iter()
      .filter(|(_, v)| !v.is_empty())
      .collect();
    if !query.is_empty() {
      request = request.query(&query);
    }

    if let Some(body) = &options.body {
      request = request.json(body);
    }

    let response = request.send().await.map_err(|e| {
      if e.is_timeout() {
        ApiError::Timeout(self.timeout.as_millis() as u64)
      } else {
        ApiError::Network(e.to_string())
      }
    })?;

    let status = response.status().as_u16();
    // Read as text first: error bodies are not always JSON.
    let body = response
      .text()
      .await
      .map_err(|e| ApiError::Network(e.to_string()))?;

    let result = handle_response(status, &body);
    if let Err(err) = &result {
      warn!(%method, path, status, %err, "request failed");
    }
    result
  }
}

/// Parse and normalize the configured base URL.
///
/// A trailing slash is required for `Url::join` to treat the last path
/// segment ("/api/v1") as a directory rather than a file.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
  let normalized = if raw.ends_with('/') {
    raw.to_string()
  } else {
    format!("{}/", raw)
  };
  Url::parse(&normalized).map_err(|e| ConfigError::InvalidUrl {
    url: raw.to_string(),
    message: e.to_string(),
  })
}

/// Decode a response body, classifying non-2xx statuses into [`ApiError`].
fn handle_response(status: u16, body: &str) -> Result<Value, ApiError> {
  if !(200..300).contains(&status) {
    return Err(ApiError::from_response(status, body));
  }

  if body.trim().is_empty() {
    return Ok(Value::Null);
  }

  serde_json::from_str(body).map_err(|e| ApiError::Decode(format!("invalid JSON response: {}", e)))
}
