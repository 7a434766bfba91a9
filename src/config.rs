use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides the configured backend URL.
pub const BACKEND_URL_ENV_VAR: &str = "CLINICA_BACKEND_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {0}")]
  NotFound(String),

  #[error("failed to read config file {path}: {source}")]
  Io {
    path: String,
    source: std::io::Error,
  },

  #[error("failed to parse config file {path}: {source}")]
  Parse {
    path: String,
    source: serde_yaml::Error,
  },

  #[error("invalid backend URL {url}: {message}")]
  InvalidUrl { url: String, message: String },

  #[error("failed to build HTTP client: {0}")]
  Http(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  pub backend: BackendConfig,
  pub cache: CacheConfig,
  /// Default page size for list requests
  pub page_limit: u32,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      backend: BackendConfig::default(),
      cache: CacheConfig::default(),
      page_limit: 5,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
  /// Base URL of the REST backend, e.g. "http://localhost:4000/api/v1"
  pub url: String,
  /// Per-request timeout in seconds
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Seconds before a cached response is considered stale and a background
  /// refresh is triggered on the next read
  pub stale_secs: u64,
  /// Seconds before a cached response is dropped entirely, even as stale
  pub evict_secs: u64,
}

impl Default for BackendConfig {
  fn default() -> Self {
    Self {
      url: "http://localhost:4000/api/v1".to_string(),
      timeout_secs: 10,
    }
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: 45,
      evict_secs: 300,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./clinica.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/clinica/config.yaml
  ///
  /// When no file is found, defaults are used. The `CLINICA_BACKEND_URL`
  /// environment variable overrides the backend URL either way.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(ConfigError::NotFound(p.display().to_string()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var(BACKEND_URL_ENV_VAR) {
      if !url.is_empty() {
        config.backend.url = url;
      }
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("clinica.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("clinica").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
      path: path.display().to_string(),
      source: e,
    })?;

    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
      path: path.display().to_string(),
      source: e,
    })
  }

  /// Per-request timeout as a `Duration`.
  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.backend.timeout_secs)
  }
}
