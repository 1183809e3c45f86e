use std::fmt;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store key derived from a page URL.
///
/// The key is the URL-safe base64 encoding of the URL bytes, so it is stable
/// for a given URL and distinct URLs never share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageKey(String);

impl PageKey {
  pub fn from_url(url: &str) -> Self {
    Self(URL_SAFE_NO_PAD.encode(url.as_bytes()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for PageKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Status of a page execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStatus {
  Loading,
  Success,
  Error,
  NotFound,
}

impl ExecutionStatus {
  /// Whether the execution has finished.
  pub fn is_terminal(self) -> bool {
    !matches!(self, Self::Loading)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Loading => "loading",
      Self::Success => "success",
      Self::Error => "error",
      Self::NotFound => "not-found",
    }
  }
}

impl fmt::Display for ExecutionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The latest known result for one page.
///
/// Build these through the constructors: they keep `content` present only
/// for `Success` and `error` present only for `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
  pub id: PageKey,
  pub url: String,
  pub status: ExecutionStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  /// Fetch duration in milliseconds. Zero while loading.
  #[serde(rename = "executionTime")]
  pub execution_time_ms: u64,
  pub last_updated: DateTime<Utc>,
}

impl ExecutionResult {
  /// A pending placeholder written when an execution starts.
  pub fn loading(url: impl Into<String>) -> Self {
    Self::new(url.into(), ExecutionStatus::Loading, None, None, Duration::ZERO)
  }

  pub fn success(url: impl Into<String>, content: serde_json::Value, elapsed: Duration) -> Self {
    Self::new(
      url.into(),
      ExecutionStatus::Success,
      Some(content),
      None,
      elapsed,
    )
  }

  pub fn failed(url: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
    Self::new(
      url.into(),
      ExecutionStatus::Error,
      None,
      Some(error.into()),
      elapsed,
    )
  }

  pub fn not_found(url: impl Into<String>, elapsed: Duration) -> Self {
    Self::new(url.into(), ExecutionStatus::NotFound, None, None, elapsed)
  }

  fn new(
    url: String,
    status: ExecutionStatus,
    content: Option<serde_json::Value>,
    error: Option<String>,
    elapsed: Duration,
  ) -> Self {
    Self {
      id: PageKey::from_url(&url),
      url,
      status,
      content,
      error,
      execution_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
      last_updated: Utc::now(),
    }
  }

  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_page_key_is_stable() {
    assert_eq!(PageKey::from_url("/about"), PageKey::from_url("/about"));
  }

  #[test]
  fn test_page_key_distinguishes_urls() {
    let urls = ["/", "/a", "/a/", "/A", "/a?x=1", "/a b", "a", "", "/\u{e9}"];
    let keys: std::collections::HashSet<_> = urls.iter().map(|u| PageKey::from_url(u)).collect();
    assert_eq!(keys.len(), urls.len());
  }

  #[test]
  fn test_constructors_couple_status_and_payload() {
    let ok = ExecutionResult::success("/a", json!({"data": {}}), Duration::from_millis(12));
    assert_eq!(ok.status, ExecutionStatus::Success);
    assert!(ok.content.is_some());
    assert!(ok.error.is_none());
    assert_eq!(ok.execution_time_ms, 12);

    let failed = ExecutionResult::failed("/a", "boom", Duration::from_millis(3));
    assert_eq!(failed.status, ExecutionStatus::Error);
    assert!(failed.content.is_none());
    assert_eq!(failed.error.as_deref(), Some("boom"));

    let missing = ExecutionResult::not_found("/a", Duration::from_millis(3));
    assert!(missing.content.is_none());
    assert!(missing.error.is_none());

    let loading = ExecutionResult::loading("/a");
    assert!(!loading.is_terminal());
    assert_eq!(loading.execution_time_ms, 0);
  }

  #[test]
  fn test_serialized_shape() {
    let record = ExecutionResult::not_found("/gone", Duration::from_millis(5));
    let value = serde_json::to_value(&record).unwrap();

    assert_eq!(value["status"], "not-found");
    assert_eq!(value["url"], "/gone");
    assert_eq!(value["executionTime"], 5);
    assert!(value.get("lastUpdated").is_some());
    assert!(value.get("content").is_none());
  }
}
