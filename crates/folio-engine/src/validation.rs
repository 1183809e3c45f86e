//! Page validation.
//!
//! Classifies a finished execution against fixed rules: failures, missing
//! pages, slow fetches and content without the expected page data.

use std::fmt;

use folio_config::EngineConfig;
use folio_store::{ExecutionResult, ExecutionStatus};
use serde::Serialize;

/// A problem found with a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ValidationIssue {
  ExecutionFailed { message: String },
  NotFound,
  SlowExecution { elapsed_ms: u64, threshold_ms: u64 },
  MissingPageData { field: String },
}

impl fmt::Display for ValidationIssue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::ExecutionFailed { message } => write!(f, "execution failed: {message}"),
      Self::NotFound => write!(f, "page not found: create it in the content source"),
      Self::SlowExecution {
        elapsed_ms,
        threshold_ms,
      } => write!(
        f,
        "slow execution: {elapsed_ms}ms exceeds the {threshold_ms}ms threshold"
      ),
      Self::MissingPageData { field } => {
        write!(f, "missing page data: content has no '{field}' field")
      }
    }
  }
}

/// Thresholds a page is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
  pub slow_threshold_ms: u64,
  pub required_field: String,
}

impl ValidationRules {
  pub fn from_config(config: &EngineConfig) -> Self {
    Self {
      slow_threshold_ms: config.slow_threshold_ms,
      required_field: config.required_content_field.clone(),
    }
  }

  /// Every issue with a finished execution.
  pub fn check(&self, result: &ExecutionResult) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    match result.status {
      ExecutionStatus::Error => issues.push(ValidationIssue::ExecutionFailed {
        message: result.error.clone().unwrap_or_default(),
      }),
      ExecutionStatus::NotFound => issues.push(ValidationIssue::NotFound),
      ExecutionStatus::Success => {
        let has_field = result
          .content
          .as_ref()
          .and_then(|content| content.get(&self.required_field))
          .is_some_and(|value| !value.is_null());
        if !has_field {
          issues.push(ValidationIssue::MissingPageData {
            field: self.required_field.clone(),
          });
        }
      }
      ExecutionStatus::Loading => {}
    }

    if result.execution_time_ms > self.slow_threshold_ms {
      issues.push(ValidationIssue::SlowExecution {
        elapsed_ms: result.execution_time_ms,
        threshold_ms: self.slow_threshold_ms,
      });
    }

    issues
  }
}

impl Default for ValidationRules {
  fn default() -> Self {
    Self::from_config(&EngineConfig::default())
  }
}

/// Outcome of validating one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
  pub is_valid: bool,
  pub issues: Vec<ValidationIssue>,
  pub content: Option<serde_json::Value>,
}

impl ValidationReport {
  pub fn new(result: ExecutionResult, rules: &ValidationRules) -> Self {
    let issues = rules.check(&result);
    Self {
      is_valid: issues.is_empty(),
      issues,
      content: result.content,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::time::Duration;

  #[test]
  fn test_valid_page() {
    let result = ExecutionResult::success("/a", json!({"data": {"blocks": []}}), Duration::from_millis(10));
    let report = ValidationReport::new(result, &ValidationRules::default());

    assert!(report.is_valid);
    assert!(report.issues.is_empty());
    assert!(report.content.is_some());
  }

  #[test]
  fn test_slow_success_is_flagged() {
    let result = ExecutionResult::success("/a", json!({"data": {}}), Duration::from_millis(3500));
    let issues = ValidationRules::default().check(&result);

    assert_eq!(
      issues,
      vec![ValidationIssue::SlowExecution {
        elapsed_ms: 3500,
        threshold_ms: 3000
      }]
    );
    assert!(issues[0].to_string().starts_with("slow execution"));
  }

  #[test]
  fn test_threshold_is_exclusive() {
    let result = ExecutionResult::success("/a", json!({"data": {}}), Duration::from_millis(3000));
    assert!(ValidationRules::default().check(&result).is_empty());
  }

  #[test]
  fn test_missing_page_data() {
    let rules = ValidationRules::default();

    let no_field = ExecutionResult::success("/a", json!({"name": "x"}), Duration::ZERO);
    assert_eq!(
      rules.check(&no_field),
      vec![ValidationIssue::MissingPageData {
        field: "data".to_string()
      }]
    );

    let null_field = ExecutionResult::success("/a", json!({"data": null}), Duration::ZERO);
    assert_eq!(rules.check(&null_field).len(), 1);

    let not_object = ExecutionResult::success("/a", json!("plain"), Duration::ZERO);
    assert_eq!(rules.check(&not_object).len(), 1);
  }

  #[test]
  fn test_error_and_not_found() {
    let rules = ValidationRules::default();

    let failed = ExecutionResult::failed("/a", "timeout", Duration::from_millis(4000));
    let issues = rules.check(&failed);
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].to_string(), "execution failed: timeout");

    let missing = ExecutionResult::not_found("/a", Duration::ZERO);
    assert_eq!(rules.check(&missing), vec![ValidationIssue::NotFound]);
  }

  #[test]
  fn test_custom_rules() {
    let rules = ValidationRules::from_config(&EngineConfig {
      slow_threshold_ms: 50,
      required_content_field: "blocks".to_string(),
      ..EngineConfig::default()
    });

    let result = ExecutionResult::success("/a", json!({"blocks": []}), Duration::from_millis(60));
    assert_eq!(rules.check(&result).len(), 1);
  }

  #[test]
  fn test_issue_serialization() {
    let value = serde_json::to_value(ValidationIssue::SlowExecution {
      elapsed_ms: 10,
      threshold_ms: 5,
    })
    .unwrap();
    assert_eq!(value, json!({"kind": "slow-execution", "elapsed_ms": 10, "threshold_ms": 5}));
  }
}
