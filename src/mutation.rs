//! Mutation coordination: cache invalidation and optimistic updates.

use std::future::Future;

use tracing::debug;

use crate::cache::MemoryStore;
use crate::error::ApiError;

/// Wraps create/update/delete operations.
///
/// On success every cache entry reading from the mutated resource is
/// invalidated — coarse by design: sibling list pages are cheap to refetch
/// at this scale, and tracking per-entity dependencies is not. On failure
/// the cache is left untouched; the mutation did not take effect, so the
/// cached data is still authoritative.
#[derive(Clone)]
pub struct MutationCoordinator {
  store: MemoryStore,
}

impl MutationCoordinator {
  pub fn new(store: MemoryStore) -> Self {
    Self { store }
  }

  /// Run a mutation against `resource`, invalidating its cache entries on
  /// success. The operation's error propagates unchanged.
  pub async fn mutate<T, Fut>(&self, resource: &str, operation: Fut) -> Result<T, ApiError>
  where
    Fut: Future<Output = Result<T, ApiError>>,
  {
    let result = operation.await;

    if result.is_ok() {
      let removed = self.store.invalidate_resource(resource);
      debug!(resource, removed, "mutation committed");
    }

    result
  }

  /// Like [`mutate`](Self::mutate), with an optimistic local update.
  ///
  /// `apply` runs before the operation is polled and returns a snapshot of
  /// the pre-mutation state. If the operation fails, `rollback` receives
  /// that snapshot before the error is rethrown, so callers never observe
  /// an optimistic value alongside an error.
  pub async fn mutate_optimistic<T, S, Fut, A, R>(
    &self,
    resource: &str,
    operation: Fut,
    apply: A,
    rollback: R,
  ) -> Result<T, ApiError>
  where
    Fut: Future<Output = Result<T, ApiError>>,
    A: FnOnce() -> S,
    R: FnOnce(S),
  {
    let snapshot = apply();

    match operation.await {
      Ok(value) => {
        let removed = self.store.invalidate_resource(resource);
        debug!(resource, removed, "optimistic mutation committed");
        Ok(value)
      }
      Err(err) => {
        rollback(snapshot);
        Err(err)
      }
    }
  }
}
