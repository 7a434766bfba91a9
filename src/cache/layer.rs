//! Cache layer that orchestrates caching logic with network fetching.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::key::Fingerprint;
use super::store::{CacheState, MemoryStore};
use crate::error::ApiError;

/// Read-path orchestration over a [`MemoryStore`].
///
/// 1. Fresh entry: return it immediately, no network.
/// 2. Stale entry: return it immediately AND trigger one background
///    revalidation that updates the store when it resolves.
/// 3. Miss: block on the (deduplicated) fetch and populate the store.
///
/// Concurrent identical reads share a single in-flight request either way.
#[derive(Clone)]
pub struct CacheLayer {
  store: MemoryStore,
}

impl CacheLayer {
  pub fn new(store: MemoryStore) -> Self {
    Self { store }
  }

  /// The underlying store, for mutation-side invalidation.
  pub fn store(&self) -> &MemoryStore {
    &self.store
  }

  /// Fetch through the cache. `fetch` is only invoked on a miss or to
  /// revalidate a stale entry.
  pub async fn fetch_with<F, Fut>(
    &self,
    fingerprint: &Fingerprint,
    fetch: F,
  ) -> Result<Arc<Value>, ApiError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
  {
    match self.store.get(fingerprint) {
      Some(hit) => {
        match hit.state {
          CacheState::Fresh | CacheState::Revalidating => {
            debug!(fingerprint = %fingerprint, state = ?hit.state, "cache hit");
          }
          CacheState::Stale => {
            debug!(fingerprint = %fingerprint, "serving stale, revalidating in background");
            // Spawned inside the store; dropping the handle is fine.
            let _ = self.store.fetch_shared(fingerprint, fetch);
          }
        }
        Ok(hit.payload)
      }
      None => {
        debug!(fingerprint = %fingerprint, "cache miss");
        self.store.fetch_shared(fingerprint, fetch).await
      }
    }
  }
}
