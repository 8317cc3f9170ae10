pub mod digest;
pub mod mailer;
pub mod providers;
pub mod scoring;
pub mod search;
pub mod similarity_cache;

pub use digest::{Digest, DigestGenerator, SubscriberDigest};
pub use mailer::{DispatchReport, LogMailer, Mailer, MailerError, WeeklyDigestJob};
pub use providers::{ListenBrainzProvider, ProviderError, SimilarityProvider};
pub use scoring::{ConcertScorer, LocalArtistScorer, Relevance, ScoredConcert};
pub use search::{SearchHit, SearchPipeline, SearchResults};
pub use similarity_cache::{CachedSimilarity, SimilarityCache};
