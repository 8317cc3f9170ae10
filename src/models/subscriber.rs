use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{ConcertTag, References, TagFilter};

/// Someone who receives the weekly recommendation digest
///
/// Only opted-in subscribers with a verified address are ever handed to the
/// digest generator; that filtering belongs to the subscriber source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub subscriber_id: i64,
    pub contact_address: String,
    /// Catalog ids of the subscriber's favourite artists
    pub reference_artists: BTreeSet<String>,
    pub preferred_tags: BTreeSet<ConcertTag>,
}

impl Subscriber {
    pub fn new(subscriber_id: i64, contact_address: impl Into<String>) -> Self {
        Self {
            subscriber_id,
            contact_address: contact_address.into(),
            reference_artists: BTreeSet::new(),
            preferred_tags: BTreeSet::new(),
        }
    }

    pub fn with_references<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reference_artists = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = ConcertTag>) -> Self {
        self.preferred_tags = tags.into_iter().collect();
        self
    }

    pub fn references(&self) -> References {
        References::from_ids(self.reference_artists.iter().cloned())
    }

    pub fn tag_filter(&self) -> TagFilter {
        TagFilter::from_selection(self.preferred_tags.iter().copied())
    }
}
