use serde::{Deserialize, Serialize};

/// Where the HTTP content source talks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
  /// Base URL of the content API (e.g. "https://cdn.builder.io/").
  pub base_url: String,
  /// Public API key sent with every request.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub api_key: Option<String>,
  /// Page size used when listing all content of a model.
  pub page_size: usize,
}

impl Default for SourceConfig {
  fn default() -> Self {
    Self {
      base_url: "https://cdn.builder.io/".to_string(),
      api_key: None,
      page_size: 100,
    }
  }
}
