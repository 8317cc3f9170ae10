//! ListenBrainz similar-artists provider
//!
//! Calls the labs `similar-artists/json` endpoint, which returns one entry per
//! related artist with a raw session-overlap score. Scores are unbounded, so
//! they are divided by the largest score in the response to land in `[0, 1]`.

use reqwest::{header, Client as HttpClient};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use crate::{
    config::Config,
    models::SimilarityMap,
    services::providers::{ProviderError, SimilarityProvider},
};

/// One related artist as returned by ListenBrainz
#[derive(Debug, Clone, Deserialize)]
pub struct ListenBrainzSimilarArtist {
    pub artist_mbid: String,
    #[serde(default)]
    pub name: Option<String>,
    pub score: f64,
}

#[derive(Clone)]
pub struct ListenBrainzProvider {
    http_client: HttpClient,
    api_url: String,
    algorithm: String,
}

impl ListenBrainzProvider {
    /// Creates a provider with auth and User-Agent headers baked into the client
    pub fn new(
        api_url: String,
        algorithm: String,
        token: Option<&str>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Token {}", token))
                .map_err(|e| ProviderError::Malformed(format!("invalid token header: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let http_client = HttpClient::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            api_url,
            algorithm,
        })
    }

    pub fn from_config(config: &Config, timeout: Duration) -> Result<Self, ProviderError> {
        Self::new(
            config.listenbrainz_url.clone(),
            config.listenbrainz_algorithm.clone(),
            config.listenbrainz_token.as_deref(),
            &config.user_agent,
            timeout,
        )
    }
}

/// Turn raw ListenBrainz entries into a normalised similarity map
///
/// The queried artist itself is dropped; self-similarity is answered by the
/// cache. Negative or non-finite scores make the whole response malformed.
pub fn normalise_similar_artists(
    catalog_id: &str,
    entries: Vec<ListenBrainzSimilarArtist>,
) -> Result<SimilarityMap, ProviderError> {
    if let Some(bad) = entries.iter().find(|e| !e.score.is_finite() || e.score < 0.0) {
        return Err(ProviderError::Malformed(format!(
            "invalid score {} for {}",
            bad.score, bad.artist_mbid
        )));
    }

    let related: Vec<_> = entries
        .into_iter()
        .filter(|e| e.artist_mbid != catalog_id && !e.artist_mbid.is_empty())
        .collect();

    let max = related.iter().map(|e| e.score).fold(0.0_f64, f64::max);
    if max == 0.0 {
        return Ok(related.into_iter().map(|e| (e.artist_mbid, 0.0)).collect());
    }

    let mut map = SimilarityMap::with_capacity(related.len());
    for entry in related {
        let weight = (entry.score / max).clamp(0.0, 1.0);
        // Duplicate ids keep their strongest weight
        map.entry(entry.artist_mbid)
            .and_modify(|w: &mut f64| *w = w.max(weight))
            .or_insert(weight);
    }
    Ok(map)
}

#[async_trait::async_trait]
impl SimilarityProvider for ListenBrainzProvider {
    #[instrument(skip(self), fields(provider = "listenbrainz"))]
    async fn fetch(&self, catalog_id: &str) -> Result<SimilarityMap, ProviderError> {
        let url = format!("{}/similar-artists/json", self.api_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("artist_mbids", catalog_id),
                ("algorithm", self.algorithm.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Http(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let response_text = response.text().await?;
        tracing::debug!(response = %response_text, "Raw ListenBrainz response");

        let entries: Vec<ListenBrainzSimilarArtist> = serde_json::from_str(&response_text)
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to deserialize ListenBrainz response");
                ProviderError::Malformed(e.to_string())
            })?;

        let map = normalise_similar_artists(catalog_id, entries)?;

        tracing::info!(
            catalog_id = %catalog_id,
            related = map.len(),
            "Similar artists fetched"
        );

        Ok(map)
    }
}
