//! Static content source.
//!
//! Serves pages from memory. Useful for tests, demos and offline runs from a
//! JSON fixture file of the form `{ "/path": { ..content.. }, "/gone": null }`.
//! The model argument is ignored.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SourceError;
use crate::item::{ContentItem, ContentQuery};
use crate::ContentSource;

#[derive(Debug, Clone)]
enum Outcome {
  Content(Value),
  Failure(String),
  Missing,
}

#[derive(Debug, Clone)]
struct StaticPage {
  outcome: Outcome,
  latency: Duration,
}

impl Default for StaticPage {
  fn default() -> Self {
    Self {
      outcome: Outcome::Missing,
      latency: Duration::ZERO,
    }
  }
}

/// In-memory content source with latency and failure injection.
#[derive(Debug, Default)]
pub struct StaticContentSource {
  pages: BTreeMap<String, StaticPage>,
  extra_items: Vec<ContentItem>,
  listing_failure: Option<String>,
  default_latency: Duration,
  fetch_log: Mutex<Vec<String>>,
}

impl StaticContentSource {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load pages from a JSON fixture file mapping URLs to content.
  ///
  /// A `null` value declares a listed page that has no content.
  pub async fn from_fixture_file(path: impl AsRef<Path>) -> Result<Self, SourceError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
      .await
      .map_err(|source| SourceError::Fixture {
        path: path.to_path_buf(),
        source,
      })?;
    let pages: HashMap<String, Value> = serde_json::from_str(&content)?;

    let mut source = Self::new();
    for (url, content) in pages {
      source = match content {
        Value::Null => source.with_missing_page(url),
        content => source.with_page(url, content),
      };
    }
    Ok(source)
  }

  /// Serve `content` for `url`.
  pub fn with_page(mut self, url: impl Into<String>, content: Value) -> Self {
    self.pages.entry(url.into()).or_default().outcome = Outcome::Content(content);
    self
  }

  /// Fail every fetch of `url` with `message`.
  pub fn with_failure(mut self, url: impl Into<String>, message: impl Into<String>) -> Self {
    self.pages.entry(url.into()).or_default().outcome = Outcome::Failure(message.into());
    self
  }

  /// List `url` but answer fetches with no content.
  pub fn with_missing_page(mut self, url: impl Into<String>) -> Self {
    self.pages.entry(url.into()).or_default().outcome = Outcome::Missing;
    self
  }

  /// Delay every fetch of `url` by `latency`.
  pub fn with_latency(mut self, url: impl Into<String>, latency: Duration) -> Self {
    self.pages.entry(url.into()).or_default().latency = latency;
    self
  }

  /// Delay fetches of URLs without their own latency.
  pub fn with_default_latency(mut self, latency: Duration) -> Self {
    self.default_latency = latency;
    self
  }

  /// List an extra item that has no page of its own.
  pub fn with_item(mut self, item: ContentItem) -> Self {
    self.extra_items.push(item);
    self
  }

  /// Fail listings with `message`.
  pub fn with_listing_failure(mut self, message: impl Into<String>) -> Self {
    self.listing_failure = Some(message.into());
    self
  }

  /// URLs fetched so far, in the order the fetches started.
  pub fn fetched_urls(&self) -> Vec<String> {
    self.log().clone()
  }

  pub fn fetch_count(&self) -> usize {
    self.log().len()
  }

  fn log(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
    self
      .fetch_log
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner)
  }
}

#[async_trait]
impl ContentSource for StaticContentSource {
  async fn fetch_content(
    &self,
    _model: &str,
    query: &ContentQuery,
  ) -> Result<Option<Value>, SourceError> {
    self.log().push(query.url.clone());

    let page = self.pages.get(&query.url).cloned().unwrap_or_default();
    let latency = if page.latency.is_zero() {
      self.default_latency
    } else {
      page.latency
    };
    if !latency.is_zero() {
      tokio::time::sleep(latency).await;
    }

    match page.outcome {
      Outcome::Content(content) => Ok(Some(content)),
      Outcome::Failure(message) => Err(SourceError::upstream(message)),
      Outcome::Missing => Ok(None),
    }
  }

  async fn list_all_content(&self, _model: &str) -> Result<Vec<ContentItem>, SourceError> {
    if let Some(message) = &self.listing_failure {
      return Err(SourceError::upstream(message.clone()));
    }

    let pages = self
      .pages
      .keys()
      .enumerate()
      .map(|(index, url)| ContentItem::new(format!("page-{}", index + 1), Some(url.clone())));

    Ok(pages.chain(self.extra_items.iter().cloned()).collect())
  }
}
