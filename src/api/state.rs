use std::sync::Arc;

use crate::{
    config::EngineSettings,
    db::{ConcertSource, SubscriberSource},
    services::{ConcertScorer, DigestGenerator, Mailer, SearchPipeline, SimilarityCache, WeeklyDigestJob},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchPipeline>,
    pub digests: Arc<DigestGenerator>,
    pub weekly_job: Arc<WeeklyDigestJob>,
    pub subscribers: Arc<dyn SubscriberSource>,
    pub settings: EngineSettings,
}

impl AppState {
    /// Wires the engine around one similarity cache
    pub fn new(
        cache: Arc<SimilarityCache>,
        concerts: Arc<dyn ConcertSource>,
        subscribers: Arc<dyn SubscriberSource>,
        mailer: Arc<dyn Mailer>,
        settings: EngineSettings,
    ) -> Self {
        let scorer = ConcertScorer::new(cache);
        let search = Arc::new(SearchPipeline::new(concerts.clone(), scorer.clone()));
        let digests = Arc::new(DigestGenerator::new(
            concerts,
            scorer,
            settings.concert_recs_per_email,
        ));
        let weekly_job = Arc::new(WeeklyDigestJob::new(digests.clone(), subscribers.clone(), mailer));

        Self {
            search,
            digests,
            weekly_job,
            subscribers,
            settings,
        }
    }
}
