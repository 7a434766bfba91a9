//! Async data-access client for the Clínica REST backend.
//!
//! The backend exposes plain CRUD endpoints per resource (patients, doctors,
//! medical records, roles, users). This crate wraps them in a cached,
//! auth-aware client:
//!
//! - **Transport** issues authenticated requests and normalizes every
//!   failure into a typed [`ApiError`].
//! - **Cache** deduplicates concurrent identical reads (single-flight) and
//!   serves stale data while revalidating in the background.
//! - **Mutations** invalidate the mutated resource's cache entries on
//!   success and support optimistic local updates with rollback.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clinica::{ClinicaClient, Config, EnvSession, ListParams};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let client = ClinicaClient::new(&config, Arc::new(EnvSession))?;
//!
//! let page = client.pacientes().list(ListParams::default().search("ana")).await?;
//! for paciente in &page.items {
//!     println!("{} {}", paciente.primer_nombre, paciente.primer_apellido);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clinic;
pub mod config;
pub mod error;
pub mod mutation;
pub mod resource;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use cache::{CacheLayer, CacheState, Fingerprint, MemoryStore};
pub use clinic::types;
pub use clinic::ClinicaClient;
pub use config::{Config, ConfigError};
pub use error::ApiError;
pub use mutation::MutationCoordinator;
pub use resource::{ListParams, Page, Pagination, ResourceClient, ResourceDescriptor};
pub use session::{EnvSession, NoSession, SessionAccessor, StaticSession};
pub use transport::{HttpTransport, RequestOptions, Transport};

/// Re-exported so callers can name HTTP methods without depending on
/// `reqwest` directly.
pub use reqwest::Method;
