//! Folio Config
//!
//! This crate contains the serializable configuration types for folio.
//! They describe how the page engine is tuned and where page content comes from,
//! before anything is constructed.
//!
//! Configuration can be loaded from:
//! - JSON files (via CLI with `--config=folio.json`)
//! - In-code defaults (every field has one)
//!
//! Per-call [`ExecutionOptions`] also live here since both the engine and the
//! CLI need to build them.

mod engine;
mod error;
mod options;
mod source;

pub use engine::{EngineConfig, RetentionPolicy};
pub use error::ConfigError;
pub use options::ExecutionOptions;
pub use source::SourceConfig;

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
  pub engine: EngineConfig,
  pub source: SourceConfig,
}

impl FolioConfig {
  /// Parse a configuration from a JSON string.
  pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(content)?)
  }

  /// Load a configuration file.
  ///
  /// A missing file is not an error: the defaults are returned instead.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
      return Ok(Self::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&content)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = FolioConfig::load(dir.path().join("absent.json")).unwrap();
    assert_eq!(config, FolioConfig::default());
  }

  #[test]
  fn test_partial_file_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("folio.json");
    std::fs::write(
      &path,
      r#"{ "engine": { "queue_delay_ms": 250 }, "source": { "api_key": "abc" } }"#,
    )
    .unwrap();

    let config = FolioConfig::load(&path).unwrap();
    assert_eq!(config.engine.queue_delay_ms, 250);
    assert_eq!(config.engine.slow_threshold_ms, 3000);
    assert_eq!(config.engine.default_model, "page");
    assert_eq!(config.source.api_key.as_deref(), Some("abc"));
  }

  #[test]
  fn test_invalid_json_is_reported() {
    let err = FolioConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
  }
}
