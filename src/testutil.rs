//! Shared test doubles.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::error::ApiError;
use crate::transport::{RequestOptions, Transport};

type Handler = Box<dyn Fn(&Method, &str) -> Result<Value, ApiError> + Send + Sync>;

/// Transport double that counts calls and records "METHOD path" strings.
pub(crate) struct MockTransport {
  calls: AtomicU32,
  seen: Mutex<Vec<String>>,
  handler: Handler,
}

impl MockTransport {
  pub fn new<F>(handler: F) -> Arc<Self>
  where
    F: Fn(&Method, &str) -> Result<Value, ApiError> + Send + Sync + 'static,
  {
    Arc::new(Self {
      calls: AtomicU32::new(0),
      seen: Mutex::new(Vec::new()),
      handler: Box::new(handler),
    })
  }

  pub fn calls(&self) -> u32 {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn seen_paths(&self) -> Vec<String> {
    self.seen.lock().unwrap().clone()
  }
}

#[async_trait]
impl Transport for MockTransport {
  async fn request(
    &self,
    method: Method,
    path: &str,
    _options: RequestOptions,
  ) -> Result<Value, ApiError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .seen
      .lock()
      .unwrap()
      .push(format!("{} {}", method, path));
    (self.handler)(&method, path)
  }
}
