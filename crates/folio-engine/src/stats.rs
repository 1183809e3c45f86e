//! Aggregate statistics over the current results.

use chrono::{DateTime, Utc};
use folio_store::{ExecutionResult, ExecutionStatus};
use serde::Serialize;

/// Counters and latency derived from a snapshot of the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
  pub total_pages: usize,
  pub successful_pages: usize,
  pub error_pages: usize,
  pub not_found_pages: usize,
  pub loading_pages: usize,
  /// Mean execution time of successful pages, in milliseconds. Zero if none.
  #[serde(rename = "averageExecutionTime")]
  pub average_execution_time_ms: f64,
  /// Most recent write across all pages.
  pub last_execution: Option<DateTime<Utc>>,
}

impl PerformanceStats {
  pub fn from_results(results: &[ExecutionResult]) -> Self {
    let count = |status: ExecutionStatus| results.iter().filter(|r| r.status == status).count();

    let successful_pages = count(ExecutionStatus::Success);
    let success_time: u64 = results
      .iter()
      .filter(|r| r.status == ExecutionStatus::Success)
      .map(|r| r.execution_time_ms)
      .sum();

    let average_execution_time_ms = if successful_pages == 0 {
      0.0
    } else {
      success_time as f64 / successful_pages as f64
    };

    Self {
      total_pages: results.len(),
      successful_pages,
      error_pages: count(ExecutionStatus::Error),
      not_found_pages: count(ExecutionStatus::NotFound),
      loading_pages: count(ExecutionStatus::Loading),
      average_execution_time_ms,
      last_execution: results.iter().map(|r| r.last_updated).max(),
    }
  }
}
