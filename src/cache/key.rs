//! Deterministic cache keys for read requests.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Cache key for a read request.
///
/// A fingerprint pairs the resource base path (kept readable so mutations can
/// invalidate by resource) with a SHA-256 digest of the normalized request:
/// operation plus query parameters sorted by key, empty values dropped. Two
/// logically identical reads always produce the same fingerprint regardless
/// of parameter insertion order, and `{query: ""}` hashes the same as no
/// query at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
  resource: String,
  digest: String,
}

impl Fingerprint {
  pub fn new<K, V>(resource: &str, op: &str, params: impl IntoIterator<Item = (K, V)>) -> Self
  where
    K: Into<String>,
    V: Into<String>,
  {
    // BTreeMap gives a canonical ordering; later duplicates win, matching
    // how query-string builders overwrite repeated keys.
    let normalized: BTreeMap<String, String> = params
      .into_iter()
      .map(|(k, v)| (k.into(), v.into()))
      .filter(|(_, v)| !v.is_empty())
      .collect();

    let mut canonical = format!("{}/{}", resource, op);
    for (i, (k, v)) in normalized.iter().enumerate() {
      canonical.push(if i == 0 { '?' } else { '&' });
      canonical.push_str(k);
      canonical.push('=');
      canonical.push_str(v);
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hex::encode(hasher.finalize());

    Self {
      resource: resource.to_string(),
      digest,
    }
  }

  /// The resource base path this request reads from.
  pub fn resource(&self) -> &str {
    &self.resource
  }
}

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.resource, &self.digest[..12])
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parameter_order_does_not_matter() {
    let a = Fingerprint::new(
      "pacientes",
      "list",
      vec![("page", "1"), ("limit", "5"), ("query", "ana")],
    );
    let b = Fingerprint::new(
      "pacientes",
      "list",
      vec![("query", "ana"), ("page", "1"), ("limit", "5")],
    );
    assert_eq!(a, b);
  }

  #[test]
  fn test_empty_values_are_omitted() {
    let with_empty = Fingerprint::new("pacientes", "list", vec![("page", "1"), ("query", "")]);
    let without = Fingerprint::new("pacientes", "list", vec![("page", "1")]);
    assert_eq!(with_empty, without);
  }

  #[test]
  fn test_different_params_differ() {
    let page1 = Fingerprint::new("pacientes", "list", vec![("page", "1")]);
    let page2 = Fingerprint::new("pacientes", "list", vec![("page", "2")]);
    assert_ne!(page1, page2);
  }

  #[test]
  fn test_resources_are_kept_apart() {
    let pacientes = Fingerprint::new("pacientes", "list", Vec::<(&str, &str)>::new());
    let medicos = Fingerprint::new("medicos", "list", Vec::<(&str, &str)>::new());
    assert_ne!(pacientes, medicos);
    assert_eq!(pacientes.resource(), "pacientes");
  }

  #[test]
  fn test_display_carries_resource_prefix() {
    let fp = Fingerprint::new("roles", "get/abc", Vec::<(&str, &str)>::new());
    assert!(fp.to_string().starts_with("roles:"));
  }
}
