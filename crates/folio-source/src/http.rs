//! HTTP content source.
//!
//! Speaks a hosted content API of the form:
//!
//! ```text
//! GET {base}/api/v3/content/{model}?apiKey=..&userAttributes={"urlPath":"/about"}&limit=1
//!     [&preview=true][&cachebust=true][&includeRefs=true]
//! → { "results": [ { "id": "..", "data": { "url": "/about", .. } } ] }
//! ```
//!
//! Listing uses the same endpoint with `limit`/`offset` paging.

use std::collections::HashSet;

use async_trait::async_trait;
use folio_config::SourceConfig;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::SourceError;
use crate::item::{ContentItem, ContentQuery};
use crate::ContentSource;

#[derive(Debug, Deserialize)]
struct ContentResponse {
  #[serde(default)]
  results: Vec<Value>,
}

/// Content source backed by a hosted content API.
#[derive(Debug, Clone)]
pub struct HttpContentSource {
  client: reqwest::Client,
  base_url: Url,
  api_key: Option<String>,
  page_size: usize,
}

impl HttpContentSource {
  pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
    Self::with_client(reqwest::Client::new(), config)
  }

  /// Create a source that reuses an existing HTTP client.
  pub fn with_client(client: reqwest::Client, config: &SourceConfig) -> Result<Self, SourceError> {
    // Url::join drops the last segment unless the base ends with a slash
    let mut base = config.base_url.clone();
    if !base.ends_with('/') {
      base.push('/');
    }

    Ok(Self {
      client,
      base_url: Url::parse(&base)?,
      api_key: config.api_key.clone(),
      page_size: config.page_size.max(1),
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn endpoint(&self, model: &str) -> Result<Url, SourceError> {
    let mut url = self.base_url.join(&format!("api/v3/content/{model}"))?;
    if let Some(key) = &self.api_key {
      url.query_pairs_mut().append_pair("apiKey", key);
    }
    Ok(url)
  }

  fn fetch_url(&self, model: &str, query: &ContentQuery) -> Result<Url, SourceError> {
    let mut attributes = serde_json::Map::new();
    for (key, value) in &query.targeting_attributes {
      attributes.insert(key.clone(), Value::String(value.clone()));
    }
    attributes.insert("urlPath".to_string(), Value::String(query.url.clone()));

    let mut url = self.endpoint(model)?;
    {
      let mut pairs = url.query_pairs_mut();
      pairs.append_pair("userAttributes", &Value::Object(attributes).to_string());
      pairs.append_pair("limit", "1");
      if query.preview {
        pairs.append_pair("preview", "true");
      }
      if query.cache_bust {
        pairs.append_pair("cachebust", "true");
      }
      if query.include_refs {
        pairs.append_pair("includeRefs", "true");
      }
    }
    Ok(url)
  }

  fn list_url(&self, model: &str, offset: usize) -> Result<Url, SourceError> {
    let mut url = self.endpoint(model)?;
    url
      .query_pairs_mut()
      .append_pair("limit", &self.page_size.to_string())
      .append_pair("offset", &offset.to_string())
      .append_pair("fields", "id,data.url");
    Ok(url)
  }

  async fn get_results(&self, url: Url) -> Result<Vec<Value>, SourceError> {
    let response = self.client.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(SourceError::Status {
        status: status.as_u16(),
        body,
      });
    }

    let body = response.bytes().await?;
    let parsed: ContentResponse = serde_json::from_slice(&body)?;
    Ok(parsed.results)
  }
}

/// Map a raw listing entry to an item. Entries without an id are skipped.
fn item_from_value(value: &Value) -> Option<ContentItem> {
  let id = value.get("id")?.as_str()?;
  let url = value
    .pointer("/data/url")
    .and_then(Value::as_str)
    .map(str::to_string);
  Some(ContentItem::new(id, url))
}

#[async_trait]
impl ContentSource for HttpContentSource {
  #[instrument(name = "content_fetch", skip(self, query), fields(url = %query.url))]
  async fn fetch_content(
    &self,
    model: &str,
    query: &ContentQuery,
  ) -> Result<Option<Value>, SourceError> {
    let url = self.fetch_url(model, query)?;
    let results = self.get_results(url).await?;
    debug!(results = results.len(), "content fetched");
    Ok(results.into_iter().next())
  }

  #[instrument(name = "content_list", skip(self))]
  async fn list_all_content(&self, model: &str) -> Result<Vec<ContentItem>, SourceError> {
    let mut listing = Listing::new(self.page_size);

    while let Some(offset) = listing.next_offset() {
      let page = self.get_results(self.list_url(model, offset)?).await?;
      listing.push_page(&page);
    }

    let items = listing.into_items();
    debug!(items = items.len(), "content listed");
    Ok(items)
  }
}

/// Accumulates listing pages until one comes back short.
///
/// A full page that adds no unseen ids also ends the listing, so a server that
/// ignores `offset` cannot keep it going forever.
struct Listing {
  page_size: usize,
  offset: usize,
  done: bool,
  seen: HashSet<String>,
  items: Vec<ContentItem>,
}

impl Listing {
  fn new(page_size: usize) -> Self {
    Self {
      page_size,
      offset: 0,
      done: false,
      seen: HashSet::new(),
      items: Vec::new(),
    }
  }

  fn next_offset(&self) -> Option<usize> {
    (!self.done).then_some(self.offset)
  }

  fn push_page(&mut self, page: &[Value]) {
    let before = self.items.len();
    for item in page.iter().filter_map(item_from_value) {
      if self.seen.insert(item.id.clone()) {
        self.items.push(item);
      }
    }

    if page.is_empty() || page.len() < self.page_size {
      self.done = true;
    } else if self.items.len() == before {
      warn!(offset = self.offset, "listing page repeated known items, stopping");
      self.done = true;
    }
    self.offset += page.len();
  }

  fn into_items(self) -> Vec<ContentItem> {
    self.items
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn source(api_key: Option<&str>) -> HttpContentSource {
    HttpContentSource::new(&SourceConfig {
      base_url: "https://cms.example.com/root".to_string(),
      api_key: api_key.map(str::to_string),
      page_size: 50,
    })
    .unwrap()
  }

  fn query_value(url: &Url, name: &str) -> Option<String> {
    url
      .query_pairs()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v.into_owned())
  }

  #[test]
  fn test_base_url_keeps_last_segment() {
    let source = source(None);
    let url = source.fetch_url("page", &ContentQuery::new("/")).unwrap();
    assert_eq!(url.path(), "/root/api/v3/content/page");
  }

  #[test]
  fn test_fetch_url_carries_query() {
    let source = source(Some("key-123"));
    let mut query = ContentQuery::new("/pricing");
    query.preview = true;
    query.include_refs = true;
    query
      .targeting_attributes
      .insert("locale".to_string(), "de".to_string());

    let url = source.fetch_url("page", &query).unwrap();

    assert_eq!(query_value(&url, "apiKey").as_deref(), Some("key-123"));
    assert_eq!(query_value(&url, "limit").as_deref(), Some("1"));
    assert_eq!(query_value(&url, "preview").as_deref(), Some("true"));
    assert_eq!(query_value(&url, "includeRefs").as_deref(), Some("true"));
    assert_eq!(query_value(&url, "cachebust"), None);

    let attributes: Value =
      serde_json::from_str(&query_value(&url, "userAttributes").unwrap()).unwrap();
    assert_eq!(attributes, json!({"urlPath": "/pricing", "locale": "de"}));
  }

  #[test]
  fn test_url_path_overrides_targeting_attribute() {
    let source = source(None);
    let mut query = ContentQuery::new("/real");
    query
      .targeting_attributes
      .insert("urlPath".to_string(), "/spoofed".to_string());

    let url = source.fetch_url("page", &query).unwrap();
    let attributes: Value =
      serde_json::from_str(&query_value(&url, "userAttributes").unwrap()).unwrap();
    assert_eq!(attributes["urlPath"], "/real");
  }

  #[test]
  fn test_list_url_pages() {
    let source = source(None);
    let url = source.list_url("page", 100).unwrap();

    assert_eq!(query_value(&url, "apiKey"), None);
    assert_eq!(query_value(&url, "limit").as_deref(), Some("50"));
    assert_eq!(query_value(&url, "offset").as_deref(), Some("100"));
  }

  #[test]
  fn test_item_from_value() {
    let item = item_from_value(&json!({"id": "a1", "data": {"url": "/home"}})).unwrap();
    assert_eq!(item, ContentItem::new("a1", Some("/home".to_string())));

    let item = item_from_value(&json!({"id": "b2", "data": {}})).unwrap();
    assert_eq!(item.page_url(), "/b2");

    assert!(item_from_value(&json!({"data": {"url": "/x"}})).is_none());
  }

  #[test]
  fn test_invalid_base_url() {
    let err = HttpContentSource::new(&SourceConfig {
      base_url: "not a url".to_string(),
      ..SourceConfig::default()
    })
    .unwrap_err();
    assert!(matches!(err, SourceError::InvalidUrl(_)));
  }

  fn listing_page(ids: std::ops::Range<usize>) -> Vec<Value> {
    ids
      .map(|n| json!({"id": format!("c{n}"), "data": {"url": format!("/p{n}")}}))
      .collect()
  }

  #[test]
  fn test_listing_pages_until_short_page() {
    let mut listing = Listing::new(2);

    assert_eq!(listing.next_offset(), Some(0));
    listing.push_page(&listing_page(0..2));
    assert_eq!(listing.next_offset(), Some(2));
    listing.push_page(&listing_page(2..3));
    assert_eq!(listing.next_offset(), None);

    let urls: Vec<String> = listing.into_items().iter().map(ContentItem::page_url).collect();
    assert_eq!(urls, vec!["/p0", "/p1", "/p2"]);
  }

  #[test]
  fn test_listing_stops_when_offset_is_ignored() {
    let mut listing = Listing::new(2);

    listing.push_page(&listing_page(0..2));
    listing.push_page(&listing_page(0..2));

    assert_eq!(listing.next_offset(), None);
    assert_eq!(listing.into_items().len(), 2);
  }
}
