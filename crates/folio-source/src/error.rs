use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by a content source.
#[derive(Debug, Error)]
pub enum SourceError {
  /// The request could not be sent or the response could not be read.
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The content API answered with a non-success status.
  #[error("content API returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("invalid content API url: {0}")]
  InvalidUrl(#[from] url::ParseError),

  #[error("malformed response: {0}")]
  Decode(#[from] serde_json::Error),

  #[error("failed to read fixture file {path}")]
  Fixture {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The source reported a failure of its own.
  #[error("{0}")]
  Upstream(String),
}

impl SourceError {
  pub fn upstream(message: impl Into<String>) -> Self {
    Self::Upstream(message.into())
  }
}
