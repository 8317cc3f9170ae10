use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    db::SubscriberSource,
    error::AppResult,
    models::Subscriber,
    services::digest::{Digest, DigestGenerator},
};

#[derive(thiserror::Error, Debug)]
pub enum MailerError {
    #[error("Delivery to {address} failed: {reason}")]
    Delivery { address: String, reason: String },
}

/// Hands a finished digest to whatever delivers mail
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send_digest(&self, subscriber: &Subscriber, digest: &Digest) -> Result<(), MailerError>;
}

/// Mailer that only records what would have been sent
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send_digest(&self, subscriber: &Subscriber, digest: &Digest) -> Result<(), MailerError> {
        let concert_ids: Vec<i64> = digest.concerts.iter().map(|c| c.concert_id).collect();
        tracing::info!(
            to = %subscriber.contact_address,
            concerts = ?concert_ids,
            used_fallback = digest.used_fallback,
            "Weekly digest dispatched"
        );
        Ok(())
    }
}

/// Totals of one digest run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    /// Empty digests are never mailed
    pub skipped: usize,
    pub failed: usize,
}

/// The weekly batch: generate every digest and mail the non-empty ones
#[derive(Clone)]
pub struct WeeklyDigestJob {
    generator: Arc<DigestGenerator>,
    subscribers: Arc<dyn SubscriberSource>,
    mailer: Arc<dyn Mailer>,
}

impl WeeklyDigestJob {
    pub fn new(
        generator: Arc<DigestGenerator>,
        subscribers: Arc<dyn SubscriberSource>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            generator,
            subscribers,
            mailer,
        }
    }

    /// A failed delivery is counted and the batch continues
    #[instrument(skip(self))]
    pub async fn run(&self, today: NaiveDate) -> AppResult<DispatchReport> {
        let subscribers = self.subscribers.digest_subscribers().await?;
        let digests = self.generator.generate(today, &subscribers).await?;

        let mut report = DispatchReport::default();
        for entry in &digests {
            if entry.digest.is_empty() {
                tracing::debug!(subscriber_id = entry.subscriber.subscriber_id, "Skipping empty digest");
                report.skipped += 1;
                continue;
            }

            match self.mailer.send_digest(&entry.subscriber, &entry.digest).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    tracing::warn!(
                        subscriber_id = entry.subscriber.subscriber_id,
                        error = %e,
                        "Digest delivery failed"
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            "Weekly digest run finished"
        );
        Ok(report)
    }
}
