use serde::Serialize;
use std::{collections::BTreeSet, sync::Arc};
use tracing::instrument;

use crate::{
    models::{Concert, LocalArtist},
    services::SimilarityCache,
};

/// Relevance of a performer or concert to a set of reference artists
///
/// `degraded` is set when at least one similarity lookup had no data at all
/// because the provider failed, so part of the score is "unknown" rather
/// than a genuine zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Relevance {
    pub score: f64,
    pub degraded: bool,
}

impl Relevance {
    pub const NONE: Relevance = Relevance {
        score: 0.0,
        degraded: false,
    };

    /// Arithmetic mean of the scores; degraded if any part is
    fn mean(parts: impl IntoIterator<Item = Relevance>) -> Relevance {
        let mut total = 0.0;
        let mut count = 0usize;
        let mut degraded = false;
        for part in parts {
            total += part.score;
            count += 1;
            degraded |= part.degraded;
        }

        if count == 0 {
            return Relevance::NONE;
        }
        Relevance {
            score: total / count as f64,
            degraded,
        }
    }
}

/// Scores one performer against a listener's reference artists
///
/// The score is the flat mean of the similarity over every
/// (analog, reference) pair; an analog that is itself a reference counts 1.
#[derive(Clone)]
pub struct LocalArtistScorer {
    cache: Arc<SimilarityCache>,
}

impl LocalArtistScorer {
    pub fn new(cache: Arc<SimilarityCache>) -> Self {
        Self { cache }
    }

    pub async fn score(&self, artist: &LocalArtist, references: &BTreeSet<String>) -> Relevance {
        if artist.chosen_analogs.is_empty() || references.is_empty() {
            return Relevance::NONE;
        }

        let mut pairs = Vec::with_capacity(artist.chosen_analogs.len() * references.len());
        for analog in &artist.chosen_analogs {
            // Self pairs never need the cache
            let lookup = if references.iter().any(|reference| reference != analog) {
                Some(self.cache.lookup(analog).await)
            } else {
                None
            };
            let degraded = lookup.as_ref().is_some_and(|l| l.is_unavailable());

            for reference in references {
                let score = if reference == analog {
                    1.0
                } else {
                    lookup.as_ref().map_or(0.0, |l| l.weight_of(reference))
                };
                pairs.push(Relevance { score, degraded });
            }
        }

        Relevance::mean(pairs)
    }
}

/// A concert paired with its relevance
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredConcert {
    pub concert: Concert,
    pub relevance: Relevance,
}

/// Scores whole concerts as the mean of their performers' scores
#[derive(Clone)]
pub struct ConcertScorer {
    artists: LocalArtistScorer,
}

impl ConcertScorer {
    pub fn new(cache: Arc<SimilarityCache>) -> Self {
        Self {
            artists: LocalArtistScorer::new(cache),
        }
    }

    #[instrument(skip_all, fields(concert_id = concert.concert_id))]
    pub async fn score(&self, concert: &Concert, references: &BTreeSet<String>) -> Relevance {
        let mut parts = Vec::with_capacity(concert.bill.len());
        for artist in &concert.bill {
            parts.push(self.artists.score(artist, references).await);
        }
        let relevance = Relevance::mean(parts);
        tracing::debug!(score = relevance.score, degraded = relevance.degraded, "Scored concert");
        relevance
    }

    pub async fn score_all(
        &self,
        concerts: Vec<Concert>,
        references: &BTreeSet<String>,
    ) -> Vec<ScoredConcert> {
        let mut scored = Vec::with_capacity(concerts.len());
        for concert in concerts {
            let relevance = self.score(&concert, references).await;
            scored.push(ScoredConcert { concert, relevance });
        }
        scored
    }
}
