//! Folio Page Engine
//!
//! This crate fetches externally-authored pages from a content source, tracks
//! every fetch as an execution with a status, and keeps the latest result per
//! page in memory for observers, stats and validation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        PageEngine                           │
//! │  - execute_page / execute_pages (concurrent batch)          │
//! │  - queue_execution (FIFO, throttled drain loop)             │
//! │  - discover_and_execute_pages, validate_page, stats         │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Runner                             │
//! │  - writes `loading`, fetches, writes the terminal result    │
//! │  - optional single-flight and fetch timeout                 │
//! └─────────────────────────────────────────────────────────────┘
//!                  │                            │
//!                  ▼                            ▼
//! ┌───────────────────────────┐   ┌─────────────────────────────┐
//! │       ContentSource       │   │  ResultStore + observers    │
//! └───────────────────────────┘   └─────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use folio_config::{EngineConfig, ExecutionOptions};
//! use folio_engine::PageEngine;
//!
//! let engine = PageEngine::new(source, EngineConfig::default());
//!
//! let _subscription = engine.subscribe(|results: &[ExecutionResult]| {
//!     println!("{} pages known", results.len());
//! });
//!
//! let result = engine.execute_page("/pricing", &ExecutionOptions::default()).await;
//! let stats = engine.performance_stats();
//! ```

mod engine;
mod queue;
mod runner;
mod stats;
mod validation;

pub use engine::PageEngine;
pub use stats::PerformanceStats;
pub use validation::{ValidationIssue, ValidationReport, ValidationRules};

pub use folio_store::{ExecutionResult, ExecutionStatus, PageKey, ResultObserver, Subscription};
