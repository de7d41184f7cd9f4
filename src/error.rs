use reqwest::StatusCode;
use thiserror::Error;

/// Failure retrieving a feed or article over HTTP.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: StatusCode },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Request { source, .. } if source.is_timeout())
    }
}

/// The feed document could not be parsed as RSS or Atom.
#[derive(Debug, Error)]
#[error("malformed feed document from {url}: {source}")]
pub struct ParseError {
    pub url: String,
    #[source]
    pub source: feed_rs::parser::ParseFeedError,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// No content block on the page was long enough to count as the article body.
#[derive(Debug, Error)]
#[error("could not extract article content from {url} (no block longer than {min_length} characters)")]
pub struct ExtractionError {
    pub url: String,
    pub min_length: usize,
}

#[derive(Debug, Error)]
pub enum ArticleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// A missing or malformed request parameter.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
