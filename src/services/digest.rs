use chrono::{NaiveDate, TimeDelta};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::Serialize;
use std::{num::NonZeroUsize, sync::Arc};
use tracing::instrument;

use crate::{
    db::ConcertSource,
    error::AppResult,
    models::{Concert, DateFilter, Subscriber, TagFilter},
    services::{scoring::ConcertScorer, search::filter_candidates},
};

/// Days covered by a digest, today included
pub const DIGEST_WINDOW_DAYS: i64 = 7;

/// Recommendations for one subscriber
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Digest {
    pub concerts: Vec<Concert>,
    /// Personalised scoring found nothing, so the list is the unscored week
    pub used_fallback: bool,
    /// Some similarity data was unavailable while scoring
    pub degraded: bool,
}

impl Digest {
    pub fn is_empty(&self) -> bool {
        self.concerts.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriberDigest {
    pub subscriber: Subscriber,
    pub digest: Digest,
}

/// Builds the weekly per-subscriber recommendation lists
#[derive(Clone)]
pub struct DigestGenerator {
    concerts: Arc<dyn ConcertSource>,
    scorer: ConcertScorer,
    max_concerts: NonZeroUsize,
}

impl DigestGenerator {
    pub fn new(concerts: Arc<dyn ConcertSource>, scorer: ConcertScorer, max_concerts: NonZeroUsize) -> Self {
        Self {
            concerts,
            scorer,
            max_concerts,
        }
    }

    /// `today` through `today + 6`
    pub fn window(today: NaiveDate) -> DateFilter {
        DateFilter::Range {
            start: today,
            end: today + TimeDelta::days(DIGEST_WINDOW_DAYS - 1),
        }
    }

    pub async fn generate(&self, today: NaiveDate, subscribers: &[Subscriber]) -> AppResult<Vec<SubscriberDigest>> {
        let mut rng = StdRng::from_entropy();
        self.generate_with_rng(today, subscribers, &mut rng).await
    }

    /// The week's concerts are loaded once and shared by every subscriber
    #[instrument(skip_all, fields(today = %today, subscribers = subscribers.len()))]
    pub async fn generate_with_rng<R>(
        &self,
        today: NaiveDate,
        subscribers: &[Subscriber],
        rng: &mut R,
    ) -> AppResult<Vec<SubscriberDigest>>
    where
        R: Rng + Send,
    {
        let window = Self::window(today);
        let (start, end) = window.bounds();
        let week = filter_candidates(
            self.concerts.concerts_between(start, end).await?,
            &window,
            &TagFilter::All,
        );

        let mut digests = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers {
            let digest = self.digest_for(subscriber, &week, rng).await;
            tracing::info!(
                subscriber_id = subscriber.subscriber_id,
                concerts = digest.concerts.len(),
                used_fallback = digest.used_fallback,
                degraded = digest.degraded,
                "Built digest"
            );
            digests.push(SubscriberDigest {
                subscriber: subscriber.clone(),
                digest,
            });
        }

        Ok(digests)
    }

    /// Digest for one subscriber over already-visible concerts of the week
    pub async fn digest_for<R>(&self, subscriber: &Subscriber, week: &[Concert], rng: &mut R) -> Digest
    where
        R: Rng + Send,
    {
        let tag_filter = subscriber.tag_filter();
        let candidates: Vec<Concert> = week
            .iter()
            .filter(|concert| tag_filter.matches(&concert.tags))
            .cloned()
            .collect();

        let mut degraded = false;
        let mut picks = Vec::new();

        if let Some(references) = subscriber.references().ids() {
            let mut scored = self.scorer.score_all(candidates.clone(), references).await;
            degraded = scored.iter().any(|entry| entry.relevance.degraded);

            scored.retain(|entry| entry.relevance.score > 0.0);
            scored.sort_by(|a, b| b.relevance.score.total_cmp(&a.relevance.score));
            picks = scored.into_iter().map(|entry| entry.concert).collect();
        }

        let used_fallback = picks.is_empty();
        if used_fallback {
            picks = candidates;
            picks.shuffle(rng);
        }

        picks.truncate(self.max_concerts.get());

        Digest {
            concerts: picks,
            used_fallback,
            degraded,
        }
    }
}
