use chrono::NaiveDate;
use std::collections::BTreeSet;

use super::ConcertTag;

/// Which dates a query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    /// Exactly one day
    Day(NaiveDate),
    /// Inclusive on both ends
    Range { start: NaiveDate, end: NaiveDate },
}

impl DateFilter {
    /// Inclusive `(first, last)` dates covered by the filter
    pub fn bounds(&self) -> (NaiveDate, NaiveDate) {
        match *self {
            DateFilter::Day(date) => (date, date),
            DateFilter::Range { start, end } => (start, end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let (first, last) = self.bounds();
        first <= date && date <= last
    }
}

/// Tag restriction of a query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TagFilter {
    /// No restriction
    #[default]
    All,
    /// Keep concerts carrying at least one of these tags
    Specific(BTreeSet<ConcertTag>),
}

impl TagFilter {
    /// An empty selection means "no restriction", never "match nothing"
    pub fn from_selection(tags: impl IntoIterator<Item = ConcertTag>) -> Self {
        let tags: BTreeSet<ConcertTag> = tags.into_iter().collect();
        if tags.is_empty() {
            TagFilter::All
        } else {
            TagFilter::Specific(tags)
        }
    }

    pub fn matches(&self, tags: &BTreeSet<ConcertTag>) -> bool {
        match self {
            TagFilter::All => true,
            TagFilter::Specific(wanted) => !wanted.is_disjoint(tags),
        }
    }
}

/// Listener taste a query is ranked against
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum References {
    #[default]
    NoPreference,
    /// Catalog ids of the reference artists
    Artists(BTreeSet<String>),
}

impl References {
    /// Blank ids are dropped; nothing left means no preference
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids
            .into_iter()
            .map(Into::into)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            References::NoPreference
        } else {
            References::Artists(ids)
        }
    }

    pub fn ids(&self) -> Option<&BTreeSet<String>> {
        match self {
            References::NoPreference => None,
            References::Artists(ids) => Some(ids),
        }
    }
}

/// Typed search request handed to the search pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub dates: DateFilter,
    pub tags: TagFilter,
    pub references: References,
}

impl SearchQuery {
    pub fn on(date: NaiveDate) -> Self {
        Self {
            dates: DateFilter::Day(date),
            tags: TagFilter::All,
            references: References::NoPreference,
        }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            dates: DateFilter::Range { start, end },
            tags: TagFilter::All,
            references: References::NoPreference,
        }
    }

    pub fn with_tags(mut self, tags: TagFilter) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_references(mut self, references: References) -> Self {
        self.references = references;
        self
    }
}
