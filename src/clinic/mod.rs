//! High-level client for the clinic backend.
//!
//! [`ClinicaClient`] wires one transport, one cache store and one mutation
//! coordinator, and hands out per-resource [`ResourceClient`]s that all share
//! them — so a mutation through any handle invalidates the reads of every
//! other handle.

pub mod types;

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};

use crate::cache::{CacheLayer, Fingerprint, MemoryStore};
use crate::config::{Config, ConfigError};
use crate::error::ApiError;
use crate::mutation::MutationCoordinator;
use crate::resource::{decode_one, ResourceClient, ResourceDescriptor};
use crate::session::SessionAccessor;
use crate::transport::{HttpTransport, RequestOptions, Transport};

use types::{
  DashboardStats, Especialidad, FichaMedica, FichaSection, Medico, Paciente, Role, User,
};

const PACIENTES: ResourceDescriptor = ResourceDescriptor {
  base_path: "pacientes",
  singular: "paciente",
  soft_delete: false,
};

const MEDICOS: ResourceDescriptor = ResourceDescriptor {
  base_path: "medicos",
  singular: "medico",
  soft_delete: true,
};

const FICHAS: ResourceDescriptor = ResourceDescriptor {
  base_path: "fichas",
  singular: "ficha",
  soft_delete: true,
};

const ROLES: ResourceDescriptor = ResourceDescriptor {
  base_path: "roles",
  singular: "role",
  soft_delete: false,
};

const USERS: ResourceDescriptor = ResourceDescriptor {
  base_path: "users",
  singular: "user",
  soft_delete: false,
};

const ESPECIALIDADES: ResourceDescriptor = ResourceDescriptor {
  base_path: "especialidades",
  singular: "especialidad",
  soft_delete: false,
};

/// Cached data-access client for every clinic resource.
pub struct ClinicaClient<T: Transport = HttpTransport> {
  transport: Arc<T>,
  cache: CacheLayer,
  mutations: MutationCoordinator,
  page_limit: u32,
}

impl<T: Transport> Clone for ClinicaClient<T> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
      cache: self.cache.clone(),
      mutations: self.mutations.clone(),
      page_limit: self.page_limit,
    }
  }
}

impl ClinicaClient<HttpTransport> {
  /// Build a client against the configured backend.
  pub fn new(config: &Config, session: Arc<dyn SessionAccessor>) -> Result<Self, ConfigError> {
    let transport = Arc::new(HttpTransport::new(config, session)?);
    Ok(Self::with_transport(transport, config))
  }
}

impl<T: Transport> ClinicaClient<T> {
  /// Build a client over an arbitrary transport. Used directly in tests.
  pub fn with_transport(transport: Arc<T>, config: &Config) -> Self {
    let store = MemoryStore::new(
      std::time::Duration::from_secs(config.cache.stale_secs),
      std::time::Duration::from_secs(config.cache.evict_secs),
    );
    Self {
      transport,
      cache: CacheLayer::new(store.clone()),
      mutations: MutationCoordinator::new(store),
      page_limit: config.page_limit,
    }
  }

  fn resource<E>(&self, descriptor: ResourceDescriptor) -> ResourceClient<E, T>
  where
    E: serde::de::DeserializeOwned + Send + 'static,
  {
    ResourceClient::new(
      descriptor,
      Arc::clone(&self.transport),
      self.cache.clone(),
      self.mutations.clone(),
      self.page_limit,
    )
  }

  pub fn pacientes(&self) -> ResourceClient<Paciente, T> {
    self.resource(PACIENTES)
  }

  pub fn medicos(&self) -> ResourceClient<Medico, T> {
    self.resource(MEDICOS)
  }

  pub fn fichas(&self) -> ResourceClient<FichaMedica, T> {
    self.resource(FICHAS)
  }

  pub fn roles(&self) -> ResourceClient<Role, T> {
    self.resource(ROLES)
  }

  pub fn users(&self) -> ResourceClient<User, T> {
    self.resource(USERS)
  }

  pub fn especialidades(&self) -> ResourceClient<Especialidad, T> {
    self.resource(ESPECIALIDADES)
  }

  /// Aggregate counters for the dashboard landing page. Cached like any
  /// other read; the backend wraps the payload in a `data` envelope.
  pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
    let fingerprint = Fingerprint::new("dashboard", "stats", Vec::<(&str, &str)>::new());

    let transport = Arc::clone(&self.transport);
    let payload = self
      .cache
      .fetch_with(&fingerprint, move || async move {
        transport
          .request(Method::GET, "dashboard/stats", RequestOptions::default())
          .await
      })
      .await?;

    let data = payload.get("data").unwrap_or(&payload);
    serde_json::from_value(data.clone())
      .map_err(|e| ApiError::Decode(format!("invalid dashboard stats: {}", e)))
  }

  /// Toggle a doctor's availability via the dedicated active-status
  /// endpoint.
  pub async fn set_medico_active(&self, id: &str, activo: bool) -> Result<Medico, ApiError> {
    let transport = Arc::clone(&self.transport);
    let path = format!("medicos/{}/active-status", id);

    self
      .mutations
      .mutate(MEDICOS.base_path, async move {
        let value = transport
          .request(
            Method::PATCH,
            &path,
            RequestOptions::default().with_body(json!({ "estaActivo": activo })),
          )
          .await?;
        decode_one(&MEDICOS, &value)
      })
      .await
  }

  /// Attach a section (antecedentes, exploración física, ...) to a medical
  /// record. The response shape varies per section, so the raw payload is
  /// returned.
  pub async fn add_ficha_section<I>(
    &self,
    ficha_id: &str,
    section: FichaSection,
    data: &I,
  ) -> Result<Value, ApiError>
  where
    I: Serialize + ?Sized,
  {
    let body = serde_json::to_value(data)
      .map_err(|e| ApiError::Decode(format!("unserializable body: {}", e)))?;
    let transport = Arc::clone(&self.transport);
    let path = format!("fichas/{}/{}", ficha_id, section.path_segment());

    self
      .mutations
      .mutate(FICHAS.base_path, async move {
        transport
          .request(
            Method::POST,
            &path,
            RequestOptions::default().with_body(body),
          )
          .await
      })
      .await
  }

  /// Record a medical consultation on a record.
  pub async fn add_consulta_medica<I>(&self, ficha_id: &str, data: &I) -> Result<Value, ApiError>
  where
    I: Serialize + ?Sized,
  {
    let body = serde_json::to_value(data)
      .map_err(|e| ApiError::Decode(format!("unserializable body: {}", e)))?;
    let transport = Arc::clone(&self.transport);
    let path = format!("fichas/{}/consultas-medicas", ficha_id);

    self
      .mutations
      .mutate(FICHAS.base_path, async move {
        transport
          .request(
            Method::POST,
            &path,
            RequestOptions::default().with_body(body),
          )
          .await
      })
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::resource::ListParams;
  use crate::testutil::MockTransport;
  use serde_json::json;

  fn medico_json(id: &str, activo: bool) -> Value {
    json!({
      "_id": id,
      "cedula": "001",
      "primerNombre": "Luis",
      "primerApellido": "Vega",
      "estado": "Activo",
      "estaActivo": activo
    })
  }

  fn client(transport: Arc<MockTransport>) -> ClinicaClient<MockTransport> {
    ClinicaClient::with_transport(transport, &Config::default())
  }

  #[tokio::test]
  async fn test_dashboard_stats_unwraps_data_envelope_and_caches() {
    let transport = MockTransport::new(|_, _| {
      Ok(json!({
        "success": true,
        "data": {"totalPacientes": 7, "totalMedicos": 2},
        "message": "ok"
      }))
    });
    let client = client(Arc::clone(&transport));

    let stats = client.dashboard_stats().await.unwrap();
    assert_eq!(stats.total_pacientes, 7);
    assert_eq!(stats.total_medicos, 2);

    client.dashboard_stats().await.unwrap();
    assert_eq!(transport.calls(), 1);
  }

  #[tokio::test]
  async fn test_set_medico_active_hits_endpoint_and_invalidates() {
    let transport = MockTransport::new(|method, path| {
      if *method == Method::PATCH {
        assert_eq!(path, "medicos/m1/active-status");
        Ok(json!({ "medico": medico_json("m1", false) }))
      } else {
        Ok(json!({ "medicos": [medico_json("m1", true)] }))
      }
    });
    let client = client(Arc::clone(&transport));

    client.medicos().list(ListParams::default()).await.unwrap();
    client.medicos().list(ListParams::default()).await.unwrap();
    assert_eq!(transport.calls(), 1);

    let medico = client.set_medico_active("m1", false).await.unwrap();
    assert!(!medico.esta_activo);

    // Cached medicos lists were invalidated by the toggle
    client.medicos().list(ListParams::default()).await.unwrap();
    assert_eq!(transport.calls(), 3);
  }

  #[tokio::test]
  async fn test_ficha_section_posts_to_section_path() {
    let transport = MockTransport::new(|_, _| Ok(json!({"message": "ok"})));
    let client = client(Arc::clone(&transport));

    client
      .add_ficha_section(
        "f1",
        FichaSection::AntecedentesPersonales,
        &json!({"alergias": ["penicilina"]}),
      )
      .await
      .unwrap();

    assert_eq!(
      transport.seen_paths(),
      vec!["POST fichas/f1/antecedentes-personales"]
    );
  }

  #[tokio::test]
  async fn test_mutation_through_one_handle_invalidates_another() {
    let transport = MockTransport::new(|method, _| {
      if *method == Method::POST {
        Ok(json!({"ficha": {"_id": "f9", "paciente": "p1", "estado": "Activo"}}))
      } else {
        Ok(json!({"fichas": [], "total": 0, "page": 1, "limit": 5, "totalPages": 1}))
      }
    });
    let client = client(Arc::clone(&transport));

    let fichas_a = client.fichas();
    let fichas_b = client.fichas();

    fichas_a.list(ListParams::default()).await.unwrap();
    fichas_b.list(ListParams::default()).await.unwrap();
    assert_eq!(transport.calls(), 1);

    fichas_b
      .create(&json!({"paciente": "p1"}))
      .await
      .unwrap();

    fichas_a.list(ListParams::default()).await.unwrap();
    assert_eq!(transport.calls(), 3);
  }
}
