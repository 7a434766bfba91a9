//! In-memory cache store with staleness tracking and request deduplication.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde_json::Value;
use tracing::debug;

use super::key::Fingerprint;
use crate::error::ApiError;

/// Freshness of a cache entry, evaluated lazily at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
  /// Within the stale window; serve as-is.
  Fresh,
  /// Past the stale window; serve, but refresh in the background.
  Stale,
  /// Past the stale window with a refresh already in flight.
  Revalidating,
}

/// A successful cache lookup.
#[derive(Debug, Clone)]
pub struct CacheHit {
  pub payload: Arc<Value>,
  pub fetched_at: DateTime<Utc>,
  pub state: CacheState,
}

/// The deduplicated in-flight request for one fingerprint. Clonable so every
/// concurrent caller awaits the same underlying fetch.
pub type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Value>, ApiError>>>;

struct StoredEntry {
  payload: Arc<Value>,
  fetched_at: DateTime<Utc>,
}

struct InFlight {
  id: u64,
  future: SharedFetch,
}

struct StoreInner {
  entries: Mutex<HashMap<Fingerprint, StoredEntry>>,
  in_flight: Mutex<HashMap<Fingerprint, InFlight>>,
  next_fetch_id: AtomicU64,
  stale_after: chrono::Duration,
  evict_after: chrono::Duration,
}

/// Shared in-memory cache keyed by [`Fingerprint`].
///
/// Entries hold the last successful decoded response plus its fetch
/// timestamp. Staleness degrades lazily on read; entries older than the
/// eviction window are dropped instead of served. All map access happens
/// under a lock held only for the synchronous operation, never across an
/// await, and payloads are swapped whole behind an `Arc`, so readers never
/// observe a partially written entry.
#[derive(Clone)]
pub struct MemoryStore {
  inner: Arc<StoreInner>,
}

impl MemoryStore {
  pub fn new(stale_after: std::time::Duration, evict_after: std::time::Duration) -> Self {
    Self {
      inner: Arc::new(StoreInner {
        entries: Mutex::new(HashMap::new()),
        in_flight: Mutex::new(HashMap::new()),
        next_fetch_id: AtomicU64::new(0),
        stale_after: chrono::Duration::from_std(stale_after).unwrap_or(chrono::Duration::MAX),
        evict_after: chrono::Duration::from_std(evict_after).unwrap_or(chrono::Duration::MAX),
      }),
    }
  }

  /// Look up an entry, evaluating staleness against the current time.
  ///
  /// Entries past the eviction window are removed and reported as a miss.
  pub fn get(&self, fingerprint: &Fingerprint) -> Option<CacheHit> {
    let (payload, fetched_at, age) = {
      let mut entries = lock(&self.inner.entries);
      let entry = entries.get(fingerprint)?;
      let payload = Arc::clone(&entry.payload);
      let fetched_at = entry.fetched_at;
      let age = Utc::now() - fetched_at;

      if age > self.inner.evict_after {
        entries.remove(fingerprint);
        debug!(fingerprint = %fingerprint, "evicted expired entry");
        return None;
      }

      (payload, fetched_at, age)
    };

    let state = if age <= self.inner.stale_after {
      CacheState::Fresh
    } else if lock(&self.inner.in_flight).contains_key(fingerprint) {
      CacheState::Revalidating
    } else {
      CacheState::Stale
    };

    Some(CacheHit {
      payload,
      fetched_at,
      state,
    })
  }

  /// Record a successful response for a fingerprint. The entry is Fresh
  /// until `stale_after` elapses.
  pub fn set(&self, fingerprint: Fingerprint, payload: Arc<Value>) {
    let mut entries = lock(&self.inner.entries);
    entries.insert(
      fingerprint,
      StoredEntry {
        payload,
        fetched_at: Utc::now(),
      },
    );
  }

  /// Remove every entry (and in-flight marker) matching the predicate.
  /// Returns the number of stored entries removed.
  pub fn invalidate<F>(&self, predicate: F) -> usize
  where
    F: Fn(&Fingerprint) -> bool,
  {
    let removed = {
      let mut entries = lock(&self.inner.entries);
      let before = entries.len();
      entries.retain(|fp, _| !predicate(fp));
      before - entries.len()
    };

    // Also forget matching in-flight fetches: their results predate the
    // mutation and must not repopulate the store (see fetch_shared).
    let mut in_flight = lock(&self.inner.in_flight);
    in_flight.retain(|fp, _| !predicate(fp));

    removed
  }

  /// Remove every entry whose fingerprint reads from `resource`.
  pub fn invalidate_resource(&self, resource: &str) -> usize {
    let removed = self.invalidate(|fp| fp.resource() == resource);
    debug!(resource, removed, "invalidated resource entries");
    removed
  }

  /// Deduplicated fetch: if a request for this fingerprint is already in
  /// flight, every caller awaits the same future; otherwise `factory` is
  /// invoked exactly once.
  ///
  /// The fetch is driven by a spawned task, so it completes (and populates
  /// the store) even when every foreground caller stops awaiting. On failure
  /// the in-flight marker is cleared so a later call can retry. A fetch whose
  /// marker was invalidated mid-flight still resolves for its waiters but is
  /// not allowed to repopulate the store.
  pub fn fetch_shared<F, Fut>(&self, fingerprint: &Fingerprint, factory: F) -> SharedFetch
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
  {
    let mut in_flight = lock(&self.inner.in_flight);
    if let Some(existing) = in_flight.get(fingerprint) {
      return existing.future.clone();
    }

    let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
    let inner = Arc::clone(&self.inner);
    let key = fingerprint.clone();
    let fut = factory();

    let wrapped: BoxFuture<'static, Result<Arc<Value>, ApiError>> = async move {
      let result = fut.await.map(Arc::new);

      let still_current = {
        let mut in_flight = lock(&inner.in_flight);
        let current = matches!(in_flight.get(&key), Some(marker) if marker.id == id);
        if current {
          in_flight.remove(&key);
        }
        current
      };

      if still_current {
        if let Ok(payload) = &result {
          let mut entries = lock(&inner.entries);
          entries.insert(
            key,
            StoredEntry {
              payload: Arc::clone(payload),
              fetched_at: Utc::now(),
            },
          );
        }
      }

      result
    }
    .boxed();

    let shared = wrapped.shared();
    in_flight.insert(
      fingerprint.clone(),
      InFlight {
        id,
        future: shared.clone(),
      },
    );
    drop(in_flight);

    // Drive the fetch to completion independently of the callers.
    tokio::spawn(shared.clone().map(|_| ()));

    shared
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    lock(&self.inner.entries).len()
  }
}

// A poisoned lock only means another thread panicked mid-operation; entries
// are swapped whole, so the map itself is still coherent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::atomic::AtomicU32;
  use std::time::Duration;

  fn fp(resource: &str, op: &str) -> Fingerprint {
    Fingerprint::new(resource, op, Vec::<(&str, &str)>::new())
  }

  fn store(stale: Duration, evict: Duration) -> MemoryStore {
    MemoryStore::new(stale, evict)
  }

  #[tokio::test]
  async fn test_set_then_get_is_fresh() {
    let store = store(Duration::from_secs(60), Duration::from_secs(300));
    let key = fp("pacientes", "list");

    store.set(key.clone(), Arc::new(json!({"pacientes": []})));

    let hit = store.get(&key).expect("entry should exist");
    assert_eq!(hit.state, CacheState::Fresh);
    assert_eq!(*hit.payload, json!({"pacientes": []}));
  }

  #[tokio::test]
  async fn test_entry_degrades_to_stale() {
    let store = store(Duration::ZERO, Duration::from_secs(300));
    let key = fp("pacientes", "list");

    store.set(key.clone(), Arc::new(json!([])));
    tokio::time::sleep(Duration::from_millis(5)).await;

    let hit = store.get(&key).expect("entry should exist");
    assert_eq!(hit.state, CacheState::Stale);
  }

  #[tokio::test]
  async fn test_expired_entry_is_evicted() {
    let store = store(Duration::ZERO, Duration::ZERO);
    let key = fp("pacientes", "list");

    store.set(key.clone(), Arc::new(json!([])));
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(store.get(&key).is_none());
    assert_eq!(store.len(), 0);
  }

  #[tokio::test]
  async fn test_invalidate_is_scoped_to_resource() {
    let store = store(Duration::from_secs(60), Duration::from_secs(300));
    let pacientes_list = fp("pacientes", "list");
    let pacientes_one = fp("pacientes", "get/1");
    let medicos_list = fp("medicos", "list");

    store.set(pacientes_list.clone(), Arc::new(json!([])));
    store.set(pacientes_one.clone(), Arc::new(json!({})));
    store.set(medicos_list.clone(), Arc::new(json!([])));

    let removed = store.invalidate_resource("pacientes");

    assert_eq!(removed, 2);
    assert!(store.get(&pacientes_list).is_none());
    assert!(store.get(&pacientes_one).is_none());
    assert!(store.get(&medicos_list).is_some());
  }

  #[tokio::test]
  async fn test_concurrent_fetches_share_one_call() {
    let store = store(Duration::from_secs(60), Duration::from_secs(300));
    let key = fp("pacientes", "list");
    let calls = Arc::new(AtomicU32::new(0));

    let make = |calls: Arc<AtomicU32>| {
      move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok(json!(["ana"]))
      }
    };

    let first = store.fetch_shared(&key, make(Arc::clone(&calls)));
    let second = store.fetch_shared(&key, make(Arc::clone(&calls)));

    let (a, b) = tokio::join!(first, second);
    assert_eq!(*a.unwrap(), json!(["ana"]));
    assert_eq!(*b.unwrap(), json!(["ana"]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The settled fetch populated the store
    assert_eq!(store.get(&key).unwrap().state, CacheState::Fresh);
  }

  #[tokio::test]
  async fn test_failed_fetch_clears_in_flight_marker() {
    let store = store(Duration::from_secs(60), Duration::from_secs(300));
    let key = fp("pacientes", "list");
    let calls = Arc::new(AtomicU32::new(0));

    let failing = {
      let calls = Arc::clone(&calls);
      move || async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(ApiError::Api {
          status: 500,
          message: "boom".to_string(),
        })
      }
    };

    let err = store.fetch_shared(&key, failing).await.unwrap_err();
    assert_eq!(err.http_status(), Some(500));
    assert!(store.get(&key).is_none());

    // A later call retries instead of reusing the failed future
    let ok = store
      .fetch_shared(&key, {
        let calls = Arc::clone(&calls);
        move || async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(json!([]))
        }
      })
      .await;
    assert!(ok.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_invalidated_fetch_does_not_repopulate() {
    let store = store(Duration::from_secs(60), Duration::from_secs(300));
    let key = fp("pacientes", "list");

    let pending = store.fetch_shared(&key, || async {
      tokio::time::sleep(Duration::from_millis(30)).await;
      Ok(json!(["pre-mutation"]))
    });

    tokio::time::sleep(Duration::from_millis(5)).await;
    store.invalidate_resource("pacientes");

    // Waiters still get the result, but the store stays empty
    let result = pending.await.unwrap();
    assert_eq!(*result, json!(["pre-mutation"]));
    assert!(store.get(&key).is_none());
  }

  #[tokio::test]
  async fn test_abandoned_fetch_still_populates_store() {
    let store = store(Duration::from_secs(60), Duration::from_secs(300));
    let key = fp("pacientes", "list");

    let handle = store.fetch_shared(&key, || async {
      tokio::time::sleep(Duration::from_millis(10)).await;
      Ok(json!([1, 2, 3]))
    });
    drop(handle);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let hit = store.get(&key).expect("spawned fetch should have completed");
    assert_eq!(*hit.payload, json!([1, 2, 3]));
  }

  #[tokio::test]
  async fn test_stale_entry_with_in_flight_reports_revalidating() {
    let store = store(Duration::ZERO, Duration::from_secs(300));
    let key = fp("pacientes", "list");

    store.set(key.clone(), Arc::new(json!(["old"])));
    tokio::time::sleep(Duration::from_millis(5)).await;

    let _pending = store.fetch_shared(&key, || async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      Ok(json!(["new"]))
    });

    assert_eq!(store.get(&key).unwrap().state, CacheState::Revalidating);
  }
}
