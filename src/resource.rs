//! Generic CRUD access to one backend resource.
//!
//! A [`ResourceDescriptor`] names a resource once (path, envelope key,
//! deletion style); [`ResourceClient`] layers pagination, caching and
//! mutation coordination on top of the transport for that resource.
//!
//! The backend is not consistent about response envelopes: lists arrive as a
//! bare array, `{ <plural>: [...] }`, `{ data: [...] }` or
//! `{ items | entities: [...] }`, with pagination metadata present, flat, or
//! missing entirely; single entities arrive wrapped in their singular key or
//! bare. The decoders here absorb all observed shapes so callers only ever
//! see typed pages and entities.

use std::marker::PhantomData;
use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{CacheLayer, Fingerprint};
use crate::error::ApiError;
use crate::mutation::MutationCoordinator;
use crate::transport::{RequestOptions, Transport};

/// Immutable description of one backend resource.
#[derive(Debug, Clone, Copy)]
pub struct ResourceDescriptor {
  /// URL path segment, list envelope key and invalidation scope,
  /// e.g. "pacientes"
  pub base_path: &'static str,
  /// Envelope key wrapping a single entity, e.g. "paciente"
  pub singular: &'static str,
  /// Whether deletion goes through the backend's `/{id}/soft` endpoint
  pub soft_delete: bool,
}

/// Pagination metadata for a list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
  pub total_pages: u32,
  pub current_page: u32,
  pub total_items: u64,
}

/// One page of a listed resource.
#[derive(Debug, Clone)]
pub struct Page<E> {
  pub items: Vec<E>,
  pub pagination: Pagination,
}

/// Parameters for a list request. Defaults: page 1, the client's configured
/// limit, no filters.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
  pub page: Option<u32>,
  pub limit: Option<u32>,
  /// Free-text search, sent as the `query` parameter
  pub search: Option<String>,
  /// Additional filters merged into the query string
  pub filters: Vec<(String, String)>,
}

impl ListParams {
  pub fn page(mut self, page: u32) -> Self {
    self.page = Some(page);
    self
  }

  pub fn limit(mut self, limit: u32) -> Self {
    self.limit = Some(limit);
    self
  }

  pub fn search(mut self, query: impl Into<String>) -> Self {
    self.search = Some(query.into());
    self
  }

  pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.filters.push((key.into(), value.into()));
    self
  }
}

/// Cached, mutation-aware CRUD client for a single resource.
///
/// Reads go through the cache layer (fresh hits skip the network, stale hits
/// revalidate in the background, concurrent identical reads share one
/// request). Writes go through the mutation coordinator, which invalidates
/// this resource's cache entries once the backend confirms.
pub struct ResourceClient<E, T: Transport> {
  descriptor: ResourceDescriptor,
  transport: Arc<T>,
  cache: CacheLayer,
  mutations: MutationCoordinator,
  default_limit: u32,
  _entity: PhantomData<fn() -> E>,
}

impl<E, T: Transport> Clone for ResourceClient<E, T> {
  fn clone(&self) -> Self {
    Self {
      descriptor: self.descriptor,
      transport: Arc::clone(&self.transport),
      cache: self.cache.clone(),
      mutations: self.mutations.clone(),
      default_limit: self.default_limit,
      _entity: PhantomData,
    }
  }
}

impl<E, T> ResourceClient<E, T>
where
  E: DeserializeOwned + Send + 'static,
  T: Transport,
{
  pub(crate) fn new(
    descriptor: ResourceDescriptor,
    transport: Arc<T>,
    cache: CacheLayer,
    mutations: MutationCoordinator,
    default_limit: u32,
  ) -> Self {
    Self {
      descriptor,
      transport,
      cache,
      mutations,
      default_limit,
      _entity: PhantomData,
    }
  }

  /// List a page of entities.
  pub async fn list(&self, params: ListParams) -> Result<Page<E>, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(self.default_limit).max(1);

    let mut query: Vec<(String, String)> = vec![
      ("page".to_string(), page.to_string()),
      ("limit".to_string(), limit.to_string()),
    ];
    if let Some(search) = &params.search {
      query.push(("query".to_string(), search.clone()));
    }
    query.extend(params.filters.iter().cloned());

    let fingerprint = Fingerprint::new(self.descriptor.base_path, "list", query.clone());

    let transport = Arc::clone(&self.transport);
    let path = self.descriptor.base_path.to_string();
    let payload = self
      .cache
      .fetch_with(&fingerprint, move || async move {
        transport
          .request(Method::GET, &path, RequestOptions { query, body: None })
          .await
      })
      .await?;

    decode_list(&self.descriptor, &payload, page, limit)
  }

  /// Fetch a single entity by id. Fails with `NotFound` when the backend
  /// answers 404.
  pub async fn get_by_id(&self, id: &str) -> Result<E, ApiError> {
    let fingerprint = Fingerprint::new(
      self.descriptor.base_path,
      &format!("get/{}", id),
      Vec::<(&str, &str)>::new(),
    );

    let transport = Arc::clone(&self.transport);
    let path = format!("{}/{}", self.descriptor.base_path, id);
    let payload = self
      .cache
      .fetch_with(&fingerprint, move || async move {
        transport
          .request(Method::GET, &path, RequestOptions::default())
          .await
      })
      .await?;

    decode_one(&self.descriptor, &payload)
  }

  /// Create an entity from any serializable input.
  pub async fn create<I>(&self, input: &I) -> Result<E, ApiError>
  where
    I: Serialize + ?Sized,
  {
    let body = to_body(input)?;
    let descriptor = self.descriptor;
    let transport = Arc::clone(&self.transport);
    let path = descriptor.base_path.to_string();

    self
      .mutations
      .mutate(descriptor.base_path, async move {
        let value = transport
          .request(
            Method::POST,
            &path,
            RequestOptions::default().with_body(body),
          )
          .await?;
        decode_one(&descriptor, &value)
      })
      .await
  }

  /// Update an entity with a partial patch.
  pub async fn update<I>(&self, id: &str, patch: &I) -> Result<E, ApiError>
  where
    I: Serialize + ?Sized,
  {
    let body = to_body(patch)?;
    let descriptor = self.descriptor;
    let transport = Arc::clone(&self.transport);
    let path = format!("{}/{}", descriptor.base_path, id);

    self
      .mutations
      .mutate(descriptor.base_path, async move {
        let value = transport
          .request(
            Method::PUT,
            &path,
            RequestOptions::default().with_body(body),
          )
          .await?;
        decode_one(&descriptor, &value)
      })
      .await
  }

  /// Update with an optimistic local change that is rolled back if the
  /// backend rejects the mutation. `apply` returns a snapshot of the
  /// pre-mutation state; `rollback` receives it on failure.
  pub async fn update_optimistic<I, S, A, R>(
    &self,
    id: &str,
    patch: &I,
    apply: A,
    rollback: R,
  ) -> Result<E, ApiError>
  where
    I: Serialize + ?Sized,
    A: FnOnce() -> S,
    R: FnOnce(S),
  {
    let body = to_body(patch)?;
    let descriptor = self.descriptor;
    let transport = Arc::clone(&self.transport);
    let path = format!("{}/{}", descriptor.base_path, id);

    self
      .mutations
      .mutate_optimistic(
        descriptor.base_path,
        async move {
          let value = transport
            .request(
              Method::PUT,
              &path,
              RequestOptions::default().with_body(body),
            )
            .await?;
          decode_one(&descriptor, &value)
        },
        apply,
        rollback,
      )
      .await
  }

  /// Delete an entity. Uses the backend's soft-delete endpoint when the
  /// descriptor declares one, otherwise a plain DELETE.
  pub async fn soft_delete(&self, id: &str) -> Result<(), ApiError> {
    let path = if self.descriptor.soft_delete {
      format!("{}/{}/soft", self.descriptor.base_path, id)
    } else {
      format!("{}/{}", self.descriptor.base_path, id)
    };
    self.delete_path(path).await
  }

  /// Hard-delete an entity, bypassing any soft-delete endpoint.
  pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
    self
      .delete_path(format!("{}/{}", self.descriptor.base_path, id))
      .await
  }

  async fn delete_path(&self, path: String) -> Result<(), ApiError> {
    let transport = Arc::clone(&self.transport);

    self
      .mutations
      .mutate(self.descriptor.base_path, async move {
        transport
          .request(Method::DELETE, &path, RequestOptions::default())
          .await
          .map(|_| ())
      })
      .await
  }
}

fn to_body<I: Serialize + ?Sized>(input: &I) -> Result<Value, ApiError> {
  serde_json::to_value(input).map_err(|e| ApiError::Decode(format!("unserializable body: {}", e)))
}

/// Decode a list response, absorbing every envelope shape the backend is
/// known to produce.
pub(crate) fn decode_list<E: DeserializeOwned>(
  descriptor: &ResourceDescriptor,
  payload: &Value,
  page: u32,
  limit: u32,
) -> Result<Page<E>, ApiError> {
  let items_value = if payload.is_array() {
    payload
  } else {
    [descriptor.base_path, "data", "items", "entities"]
      .iter()
      .find_map(|key| payload.get(*key).filter(|v| v.is_array()))
      .ok_or_else(|| {
        ApiError::Decode(format!(
          "no {} array in list response",
          descriptor.base_path
        ))
      })?
  };

  let items: Vec<E> = serde_json::from_value(items_value.clone())
    .map_err(|e| ApiError::Decode(format!("invalid {} entity: {}", descriptor.singular, e)))?;

  // Pagination: nested object, the flat shape some endpoints use, or
  // synthesized locally when the backend sends the whole collection.
  if let Some(pagination) = payload.get("pagination") {
    let pagination: Pagination = serde_json::from_value(pagination.clone())
      .map_err(|e| ApiError::Decode(format!("invalid pagination: {}", e)))?;
    return Ok(Page { items, pagination });
  }

  if let Some(total_pages) = payload.get("totalPages").and_then(Value::as_u64) {
    let pagination = Pagination {
      total_pages: total_pages.max(1) as u32,
      current_page: payload
        .get("page")
        .and_then(Value::as_u64)
        .unwrap_or(page as u64) as u32,
      total_items: payload
        .get("total")
        .and_then(Value::as_u64)
        .unwrap_or(items.len() as u64),
    };
    return Ok(Page { items, pagination });
  }

  // No metadata at all: the backend returned the full collection, so
  // paginate it here the way the original dashboard did.
  let total_items = items.len() as u64;
  let total_pages = (total_items.div_ceil(limit as u64)).max(1) as u32;
  let start = ((page - 1) * limit) as usize;
  let items: Vec<E> = items
    .into_iter()
    .skip(start)
    .take(limit as usize)
    .collect();

  Ok(Page {
    items,
    pagination: Pagination {
      total_pages,
      current_page: page,
      total_items,
    },
  })
}

/// Decode a single-entity response: `{ <singular>: {...} }` or the bare
/// entity.
pub(crate) fn decode_one<E: DeserializeOwned>(
  descriptor: &ResourceDescriptor,
  payload: &Value,
) -> Result<E, ApiError> {
  let entity_value = payload
    .get(descriptor.singular)
    .filter(|v| !v.is_null())
    .unwrap_or(payload);

  serde_json::from_value(entity_value.clone())
    .map_err(|e| ApiError::Decode(format!("invalid {} entity: {}", descriptor.singular, e)))
}
