//! Page execution runner.
//!
//! A run writes a `loading` record the moment it is requested, fetches the
//! page from the content source, then writes exactly one terminal record.
//! Source failures become `error` records; the runner never fails itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use folio_config::{EngineConfig, ExecutionOptions};
use folio_source::{ContentQuery, ContentSource, SourceError};
use folio_store::{ExecutionResult, PageKey, ResultStore};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

type SharedExecution = Shared<BoxFuture<'static, ExecutionResult>>;

pub(crate) struct Runner {
  source: Arc<dyn ContentSource>,
  store: Arc<ResultStore>,
  default_model: String,
  fetch_timeout: Option<Duration>,
  /// Present when concurrent requests for one page share a single fetch.
  in_flight: Option<Mutex<HashMap<PageKey, SharedExecution>>>,
}

impl Runner {
  pub(crate) fn new(
    source: Arc<dyn ContentSource>,
    store: Arc<ResultStore>,
    config: &EngineConfig,
  ) -> Self {
    Self {
      source,
      store,
      default_model: config.default_model.clone(),
      fetch_timeout: config.fetch_timeout(),
      in_flight: config
        .dedupe_in_flight
        .then(|| Mutex::new(HashMap::new())),
    }
  }

  /// Start executing `url`.
  ///
  /// The `loading` record is written before this returns, not when the
  /// returned future is first polled. Inside a tokio runtime the fetch runs on
  /// its own task, so dropping the returned future does not stop it.
  pub(crate) fn execute(
    self: &Arc<Self>,
    url: &str,
    options: &ExecutionOptions,
  ) -> BoxFuture<'static, ExecutionResult> {
    let Some(in_flight) = &self.in_flight else {
      let started = Instant::now();
      self.store.put(ExecutionResult::loading(url));
      return self.launch(url, options, started, None);
    };

    let key = PageKey::from_url(url);
    let (go, gate) = oneshot::channel();

    let shared = {
      let mut in_flight = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
      if let Some(existing) = in_flight.get(&key) {
        debug!(url, "joining in-flight execution");
        return existing.clone().boxed();
      }

      let started = Instant::now();
      let shared = self
        .launch(url, options, started, Some((key.clone(), gate)))
        .shared();
      in_flight.insert(key, shared.clone());
      shared
    };

    // Written outside the map lock so observers may start executions.
    // The task waits on the gate, so its terminal write cannot come first.
    self.store.put(ExecutionResult::loading(url));
    let _ = go.send(());
    shared.boxed()
  }

  fn forget_in_flight(&self, key: &PageKey) {
    if let Some(in_flight) = &self.in_flight {
      in_flight
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(key);
    }
  }

  fn launch(
    self: &Arc<Self>,
    url: &str,
    options: &ExecutionOptions,
    started: Instant,
    in_flight: Option<(PageKey, oneshot::Receiver<()>)>,
  ) -> BoxFuture<'static, ExecutionResult> {
    let model = options.model_or(&self.default_model).to_string();
    let query = ContentQuery {
      url: url.to_string(),
      preview: options.preview,
      cache_bust: options.cache_bust,
      include_refs: options.include_refs,
      targeting_attributes: options.targeting_attributes.clone(),
    };
    let span = info_span!("page_execute", url = %query.url, model = %model);

    let runner = Arc::clone(self);
    let execution = async move {
      let Some((key, gate)) = in_flight else {
        return runner.fetch(&model, &query, started).await;
      };
      let _ = gate.await;
      let result = runner.fetch(&model, &query, started).await;
      runner.forget_in_flight(&key);
      result
    }
    .instrument(span);

    let handle = match Handle::try_current() {
      Ok(handle) => handle,
      Err(_) => {
        debug!(url, "no tokio runtime, page runs when awaited");
        return execution.boxed();
      }
    };

    let task = handle.spawn(execution);
    let store = Arc::clone(&self.store);
    let url = url.to_string();
    async move {
      match task.await {
        Ok(result) => result,
        Err(e) => {
          error!(url = %url, error = %e, "page execution task failed");
          let result = ExecutionResult::failed(
            &url,
            format!("execution aborted: {e}"),
            started.elapsed(),
          );
          store.put(result.clone());
          result
        }
      }
    }
    .boxed()
  }

  /// Fetch the page and write the terminal record.
  async fn fetch(&self, model: &str, query: &ContentQuery, started: Instant) -> ExecutionResult {
    let outcome = match self.fetch_timeout {
      Some(limit) => tokio::time::timeout(limit, self.source.fetch_content(model, query))
        .await
        .unwrap_or_else(|_| {
          Err(SourceError::upstream(format!(
            "fetch timed out after {} ms",
            limit.as_millis()
          )))
        }),
      None => self.source.fetch_content(model, query).await,
    };

    let elapsed = started.elapsed();
    let result = match outcome {
      Ok(Some(content)) => ExecutionResult::success(&query.url, content, elapsed),
      Ok(None) => ExecutionResult::not_found(&query.url, elapsed),
      Err(e) => {
        warn!(error = %e, "page fetch failed");
        ExecutionResult::failed(&query.url, e.to_string(), elapsed)
      }
    };

    self.store.put(result.clone());
    info!(
      status = %result.status,
      execution_time_ms = result.execution_time_ms,
      "page executed"
    );
    result
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use folio_source::StaticContentSource;
  use folio_store::ExecutionStatus;
  use serde_json::json;

  fn runner(source: Arc<StaticContentSource>, config: EngineConfig) -> (Arc<Runner>, Arc<ResultStore>) {
    let store = Arc::new(ResultStore::new());
    let runner = Arc::new(Runner::new(source, Arc::clone(&store), &config));
    (runner, store)
  }

  #[tokio::test]
  async fn test_loading_written_before_first_poll() {
    let source = Arc::new(StaticContentSource::new().with_page("/a", json!({"data": {}})));
    let (runner, store) = runner(source, EngineConfig::default());

    let pending = runner.execute("/a", &ExecutionOptions::default());
    assert_eq!(store.get("/a").unwrap().status, ExecutionStatus::Loading);

    let result = pending.await;
    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(store.get("/a").unwrap(), result);
  }

  #[tokio::test]
  async fn test_terminal_status_mapping() {
    let source = Arc::new(
      StaticContentSource::new()
        .with_page("/ok", json!({"data": {}}))
        .with_failure("/broken", "503 from upstream")
        .with_missing_page("/missing"),
    );
    let (runner, _store) = runner(source, EngineConfig::default());
    let options = ExecutionOptions::default();

    let ok = runner.execute("/ok", &options).await;
    assert_eq!(ok.status, ExecutionStatus::Success);

    let broken = runner.execute("/broken", &options).await;
    assert_eq!(broken.status, ExecutionStatus::Error);
    assert_eq!(broken.error.as_deref(), Some("503 from upstream"));

    let missing = runner.execute("/missing", &options).await;
    assert_eq!(missing.status, ExecutionStatus::NotFound);
    assert!(missing.content.is_none() && missing.error.is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn test_fetch_timeout_becomes_error() {
    let source = Arc::new(
      StaticContentSource::new()
        .with_page("/hung", json!({}))
        .with_latency("/hung", Duration::from_secs(60)),
    );
    let config = EngineConfig {
      fetch_timeout_ms: Some(500),
      ..EngineConfig::default()
    };
    let (runner, _store) = runner(source, config);

    let result = runner.execute("/hung", &ExecutionOptions::default()).await;
    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(result.error.as_deref(), Some("fetch timed out after 500 ms"));
    assert!(result.execution_time_ms >= 500);
  }

  #[tokio::test(start_paused = true)]
  async fn test_dedupe_shares_one_fetch() {
    let source = Arc::new(
      StaticContentSource::new()
        .with_page("/a", json!({"data": {}}))
        .with_latency("/a", Duration::from_millis(100)),
    );
    let config = EngineConfig {
      dedupe_in_flight: true,
      ..EngineConfig::default()
    };
    let (runner, _store) = runner(Arc::clone(&source), config);
    let options = ExecutionOptions::default();

    let first = runner.execute("/a", &options);
    let second = runner.execute("/a", &options);
    let (first, second) = futures::join!(first, second);

    assert_eq!(first, second);
    assert_eq!(source.fetch_count(), 1);

    // Finished executions are not reused
    runner.execute("/a", &options).await;
    assert_eq!(source.fetch_count(), 2);
  }

  #[tokio::test]
  async fn test_without_dedupe_every_call_fetches() {
    let source = Arc::new(StaticContentSource::new().with_page("/a", json!({})));
    let (runner, _store) = runner(Arc::clone(&source), EngineConfig::default());
    let options = ExecutionOptions::default();

    futures::join!(runner.execute("/a", &options), runner.execute("/a", &options));
    assert_eq!(source.fetch_count(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn test_dropped_execution_still_completes() {
    let source = Arc::new(
      StaticContentSource::new()
        .with_page("/a", json!({"data": {}}))
        .with_latency("/a", Duration::from_millis(50)),
    );
    let (runner, store) = runner(Arc::clone(&source), EngineConfig::default());

    drop(runner.execute("/a", &ExecutionOptions::default()));
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(store.get("/a").unwrap().status, ExecutionStatus::Success);
    assert_eq!(source.fetch_count(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_dropped_dedupe_execution_is_not_rejoined() {
    let source = Arc::new(
      StaticContentSource::new()
        .with_page("/a", json!({"data": {}}))
        .with_latency("/a", Duration::from_millis(50)),
    );
    let config = EngineConfig {
      dedupe_in_flight: true,
      ..EngineConfig::default()
    };
    let (runner, store) = runner(Arc::clone(&source), config);
    let options = ExecutionOptions::default();

    drop(runner.execute("/a", &options));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(store.get("/a").unwrap().status, ExecutionStatus::Success);

    let result = runner.execute("/a", &options).await;
    assert_eq!(source.fetch_count(), 2);
    assert!(result.execution_time_ms < 1000);
  }
}
