use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning for the page engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Content model used when a call does not name one, and for discovery.
  pub default_model: String,
  /// Pause between two queued executions.
  pub queue_delay_ms: u64,
  /// Executions slower than this are flagged by page validation.
  pub slow_threshold_ms: u64,
  /// Field a successful page's content must carry to pass validation.
  pub required_content_field: String,
  /// Share one fetch between concurrent requests for the same page.
  pub dedupe_in_flight: bool,
  /// Give up on a fetch after this long. `None` waits forever.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub fetch_timeout_ms: Option<u64>,
  pub retention: RetentionPolicy,
}

impl EngineConfig {
  pub fn queue_delay(&self) -> Duration {
    Duration::from_millis(self.queue_delay_ms)
  }

  pub fn fetch_timeout(&self) -> Option<Duration> {
    self.fetch_timeout_ms.map(Duration::from_millis)
  }
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      default_model: "page".to_string(),
      queue_delay_ms: 100,
      slow_threshold_ms: 3000,
      required_content_field: "data".to_string(),
      dedupe_in_flight: false,
      fetch_timeout_ms: None,
      retention: RetentionPolicy::default(),
    }
  }
}

/// Bounds on how many results the store keeps. Unbounded by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_entries: Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub max_age_secs: Option<u64>,
}

impl RetentionPolicy {
  pub fn is_unbounded(&self) -> bool {
    self.max_entries.is_none() && self.max_age_secs.is_none()
  }
}
