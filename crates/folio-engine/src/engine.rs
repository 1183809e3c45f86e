//! Page engine facade.
//!
//! The `PageEngine` ties the result store, the runner and the execution queue
//! together. It is cheap to clone; clones share the same state. Construct one
//! per application and hand it to whoever needs it.

use std::sync::Arc;

use folio_config::{EngineConfig, ExecutionOptions};
use folio_source::{ContentItem, ContentSource};
use folio_store::{ExecutionResult, ResultObserver, ResultStore, Subscription};
use futures::future::{BoxFuture, JoinAll, join_all};
use tracing::{info, instrument, warn};

use crate::queue::ExecutionQueue;
use crate::runner::Runner;
use crate::stats::PerformanceStats;
use crate::validation::{ValidationReport, ValidationRules};

struct EngineInner {
  config: EngineConfig,
  source: Arc<dyn ContentSource>,
  store: Arc<ResultStore>,
  runner: Arc<Runner>,
  queue: Arc<ExecutionQueue>,
  rules: ValidationRules,
}

/// Executes pages against a content source and caches the latest result per page.
#[derive(Clone)]
pub struct PageEngine {
  inner: Arc<EngineInner>,
}

impl PageEngine {
  /// Create an engine over `source`.
  pub fn new(source: Arc<dyn ContentSource>, config: EngineConfig) -> Self {
    let store = Arc::new(ResultStore::with_retention(config.retention.clone()));
    let runner = Arc::new(Runner::new(
      Arc::clone(&source),
      Arc::clone(&store),
      &config,
    ));
    let queue = Arc::new(ExecutionQueue::new(config.queue_delay()));
    let rules = ValidationRules::from_config(&config);

    Self {
      inner: Arc::new(EngineInner {
        config,
        source,
        store,
        runner,
        queue,
        rules,
      }),
    }
  }

  pub fn config(&self) -> &EngineConfig {
    &self.inner.config
  }

  /// Execute one page.
  ///
  /// The page shows as `loading` as soon as this is called; the returned
  /// future resolves to the terminal result. Failures are reported in the
  /// result, never as a panic or error. Within a tokio runtime the page runs
  /// to completion even if the returned future is dropped.
  pub fn execute_page(
    &self,
    url: &str,
    options: &ExecutionOptions,
  ) -> BoxFuture<'static, ExecutionResult> {
    self.inner.runner.execute(url, options)
  }

  /// Execute several pages concurrently.
  ///
  /// Results come back in the order of `urls`, whatever order the fetches
  /// finish in. A failing page does not affect the others.
  pub fn execute_pages<S>(
    &self,
    urls: &[S],
    options: &ExecutionOptions,
  ) -> JoinAll<BoxFuture<'static, ExecutionResult>>
  where
    S: AsRef<str>,
  {
    let executions: Vec<_> = urls
      .iter()
      .map(|url| self.inner.runner.execute(url.as_ref(), options))
      .collect();
    join_all(executions)
  }

  /// Queue a page for throttled, one-at-a-time execution.
  ///
  /// Returns immediately. The result is observable through [`Self::subscribe`]
  /// or [`Self::result`]. Outside a tokio runtime the page is dropped and an
  /// error is logged.
  pub fn queue_execution(&self, url: impl Into<String>, options: ExecutionOptions) {
    self
      .inner
      .queue
      .push(&self.inner.runner, url.into(), options);
  }

  /// Number of queued pages not yet started.
  pub fn queue_len(&self) -> usize {
    self.inner.queue.len()
  }

  pub fn is_draining(&self) -> bool {
    self.inner.queue.is_draining()
  }

  /// Wait until every queued page has run and the drain loop has stopped.
  pub async fn wait_for_queue(&self) {
    self.inner.queue.wait_idle().await;
  }

  /// List every page the content source knows and execute them all.
  ///
  /// A listing failure is logged and yields no results.
  #[instrument(name = "discover_pages", skip(self), fields(model = %self.inner.config.default_model))]
  pub async fn discover_and_execute_pages(&self) -> Vec<ExecutionResult> {
    let items = match self
      .inner
      .source
      .list_all_content(&self.inner.config.default_model)
      .await
    {
      Ok(items) => items,
      Err(e) => {
        warn!(error = %e, "page discovery failed");
        return Vec::new();
      }
    };

    let urls: Vec<String> = items.iter().map(ContentItem::page_url).collect();
    info!(pages = urls.len(), "discovered pages");

    self
      .execute_pages(&urls, &ExecutionOptions::default())
      .await
  }

  /// Snapshot of all current results. Order is unspecified.
  pub fn results(&self) -> Vec<ExecutionResult> {
    self.inner.store.list()
  }

  pub fn result(&self, url: &str) -> Option<ExecutionResult> {
    self.inner.store.get(url)
  }

  pub fn clear_results(&self) {
    self.inner.store.clear();
    info!("execution results cleared");
  }

  /// Receive the full result snapshot after every change.
  ///
  /// The observer runs on the thread that made the change, while other writers
  /// wait. It may call back into the engine (`execute_page`, `clear_results`);
  /// the snapshots those calls produce are delivered after the current one.
  /// It must not block on a page from another thread, such as by
  /// `block_on(execute_page(..))`.
  pub fn subscribe<O>(&self, observer: O) -> Subscription
  where
    O: ResultObserver + 'static,
  {
    self.inner.store.subscribe(observer)
  }

  pub fn performance_stats(&self) -> PerformanceStats {
    PerformanceStats::from_results(&self.inner.store.list())
  }

  /// Execute `url` afresh and check the result against the validation rules.
  #[instrument(name = "validate_page", skip(self))]
  pub async fn validate_page(&self, url: &str) -> ValidationReport {
    let result = self
      .execute_page(url, &ExecutionOptions::default())
      .await;
    let report = ValidationReport::new(result, &self.inner.rules);

    if report.is_valid {
      info!("page is valid");
    } else {
      let issues: Vec<String> = report.issues.iter().map(ToString::to_string).collect();
      warn!(?issues, "page has issues");
    }

    report
  }

  /// Stop the queue's drain loop after its current page. Later queued pages
  /// are dropped.
  pub fn shutdown(&self) {
    self.inner.queue.shutdown();
  }
}
