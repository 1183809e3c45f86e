use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What to fetch for a single page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentQuery {
  pub url: String,
  pub preview: bool,
  pub cache_bust: bool,
  pub include_refs: bool,
  pub targeting_attributes: BTreeMap<String, String>,
}

impl ContentQuery {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      ..Self::default()
    }
  }
}

/// A content entry returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
  pub id: String,
  /// Declared page path, when the entry has one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
}

impl ContentItem {
  pub fn new(id: impl Into<String>, url: Option<String>) -> Self {
    Self { id: id.into(), url }
  }

  /// The page path for this entry, synthesized as `/{id}` when none is declared.
  pub fn page_url(&self) -> String {
    match self.url.as_deref() {
      Some(url) if !url.trim().is_empty() => url.to_string(),
      _ => format!("/{}", self.id),
    }
  }
}
