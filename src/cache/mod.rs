//! In-memory response cache: deterministic keys, staleness tracking,
//! single-flight request deduplication and stale-while-revalidate.

pub mod key;
pub mod layer;
pub mod store;

pub use key::Fingerprint;
pub use layer::CacheLayer;
pub use store::{CacheHit, CacheState, MemoryStore};
