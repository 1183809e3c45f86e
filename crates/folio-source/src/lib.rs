//! Folio Source
//!
//! This crate provides the [`ContentSource`] trait through which the page
//! engine reaches externally-authored content, plus two implementations:
//!
//! - [`HttpContentSource`] talks to a hosted content API over HTTP
//! - [`StaticContentSource`] serves pages from memory or a JSON fixture file,
//!   with optional latency and failure injection
//!
//! A source answers two questions: "what is the content at this URL" and
//! "which pages exist". An empty answer to the first is not an error; the
//! engine records it as not-found.

mod error;
mod http;
mod item;
mod static_source;

pub use error::SourceError;
pub use http::HttpContentSource;
pub use item::{ContentItem, ContentQuery};
pub use static_source::StaticContentSource;

use async_trait::async_trait;

/// Source of page content.
#[async_trait]
pub trait ContentSource: Send + Sync {
  /// Fetch the content for one page.
  ///
  /// Returns `Ok(None)` when the source answered but has no content for the URL.
  async fn fetch_content(
    &self,
    model: &str,
    query: &ContentQuery,
  ) -> Result<Option<serde_json::Value>, SourceError>;

  /// List every known content item of a model.
  async fn list_all_content(&self, model: &str) -> Result<Vec<ContentItem>, SourceError>;
}
