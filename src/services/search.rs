use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    db::ConcertSource,
    error::AppResult,
    models::{Concert, DateFilter, SearchQuery, TagFilter},
    services::scoring::{ConcertScorer, ScoredConcert},
};

/// One entry of a search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub concert: Concert,
    /// Present only when the query named reference artists
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Some similarity data was unavailable, so zero scores may be unknowns
    pub degraded: bool,
}

/// Visibility, date and tag filtering shared by search and digests
pub fn filter_candidates(concerts: Vec<Concert>, dates: &DateFilter, tags: &TagFilter) -> Vec<Concert> {
    let loaded = concerts.len();

    let visible: Vec<Concert> = concerts
        .into_iter()
        .filter(Concert::is_publicly_visible)
        .collect();
    let visible_count = visible.len();

    let dated: Vec<Concert> = visible
        .into_iter()
        .filter(|concert| dates.contains(concert.date))
        .collect();
    let dated_count = dated.len();

    let tagged: Vec<Concert> = dated
        .into_iter()
        .filter(|concert| tags.matches(&concert.tags))
        .collect();

    tracing::debug!(
        loaded,
        visible = visible_count,
        in_dates = dated_count,
        tagged = tagged.len(),
        "Filtered concert candidates"
    );

    tagged
}

/// Sorts by descending score; equal scores are ordered by a random key
/// drawn fresh for this call
pub fn rank_with_random_ties<R: Rng + ?Sized>(scored: Vec<ScoredConcert>, rng: &mut R) -> Vec<ScoredConcert> {
    let mut keyed: Vec<(u64, ScoredConcert)> = scored
        .into_iter()
        .map(|entry| (rng.gen::<u64>(), entry))
        .collect();

    keyed.sort_by(|(tie_a, a), (tie_b, b)| {
        b.relevance
            .score
            .total_cmp(&a.relevance.score)
            .then(tie_a.cmp(tie_b))
    });

    keyed.into_iter().map(|(_, entry)| entry).collect()
}

/// Answers browse-page queries: which visible concerts match, in what order
#[derive(Clone)]
pub struct SearchPipeline {
    concerts: Arc<dyn ConcertSource>,
    scorer: ConcertScorer,
}

impl SearchPipeline {
    pub fn new(concerts: Arc<dyn ConcertSource>, scorer: ConcertScorer) -> Self {
        Self { concerts, scorer }
    }

    pub async fn search(&self, query: &SearchQuery) -> AppResult<SearchResults> {
        let mut rng = StdRng::from_entropy();
        self.search_with_rng(query, &mut rng).await
    }

    /// Same as [`search`](Self::search) with a caller-supplied source of
    /// randomness for shuffles and tie-breaks
    #[instrument(skip_all, fields(dates = ?query.dates))]
    pub async fn search_with_rng<R>(&self, query: &SearchQuery, rng: &mut R) -> AppResult<SearchResults>
    where
        R: Rng + Send,
    {
        let (start, end) = query.dates.bounds();
        let loaded = self.concerts.concerts_between(start, end).await?;
        let mut candidates = filter_candidates(loaded, &query.dates, &query.tags);

        let Some(references) = query.references.ids() else {
            candidates.shuffle(rng);
            tracing::info!(results = candidates.len(), "Search without references");
            return Ok(SearchResults {
                hits: candidates
                    .into_iter()
                    .map(|concert| SearchHit {
                        concert,
                        score: None,
                    })
                    .collect(),
                degraded: false,
            });
        };

        let scored = self.scorer.score_all(candidates, references).await;
        let degraded = scored.iter().any(|entry| entry.relevance.degraded);
        let ranked = rank_with_random_ties(scored, rng);

        tracing::info!(
            results = ranked.len(),
            references = references.len(),
            degraded,
            "Ranked search results"
        );

        Ok(SearchResults {
            hits: ranked
                .into_iter()
                .map(|entry| SearchHit {
                    score: Some(entry.relevance.score),
                    concert: entry.concert,
                })
                .collect(),
            degraded,
        })
    }
}
