use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Parameters for a single page execution. Not stored with the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
  /// Content model to query. Falls back to the engine's default model.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
  pub cache_bust: bool,
  pub preview: bool,
  pub include_refs: bool,
  /// Arbitrary targeting attributes forwarded to the content source.
  pub targeting_attributes: BTreeMap<String, String>,
}

impl ExecutionOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_model(mut self, model: impl Into<String>) -> Self {
    self.model = Some(model.into());
    self
  }

  pub fn with_cache_bust(mut self, cache_bust: bool) -> Self {
    self.cache_bust = cache_bust;
    self
  }

  pub fn with_preview(mut self, preview: bool) -> Self {
    self.preview = preview;
    self
  }

  pub fn with_include_refs(mut self, include_refs: bool) -> Self {
    self.include_refs = include_refs;
    self
  }

  pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.targeting_attributes.insert(key.into(), value.into());
    self
  }

  /// The model to query, given the engine's default.
  pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
    self.model.as_deref().unwrap_or(default)
  }
}
