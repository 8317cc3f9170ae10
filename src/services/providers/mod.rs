//! Similarity data provider abstraction
//!
//! The engine only needs one thing from the outside catalog service: given a
//! canonical artist id, the related ids and how similar they are. Each
//! provider returns weights already normalised to `[0, 1]`.

use reqwest::StatusCode;

use crate::models::SimilarityMap;

pub mod listenbrainz;

pub use listenbrainz::ListenBrainzProvider;

/// Failure to obtain similarity data
///
/// Every variant means the same thing to the cache ("keep what you had");
/// the split exists for logging.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider call timed out")]
    Timeout,
}

/// Trait for similarity data providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SimilarityProvider: Send + Sync {
    /// Fetch related artists for `catalog_id`
    ///
    /// An empty map is a successful "no related artists" answer.
    async fn fetch(&self, catalog_id: &str) -> Result<SimilarityMap, ProviderError>;
}
