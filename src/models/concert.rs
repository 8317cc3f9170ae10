use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt::Display, str::FromStr};

/// Kind of set a concert offers
///
/// Serialized as the two-letter codes used in query strings and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConcertTag {
    #[serde(rename = "OG")]
    Originals,
    #[serde(rename = "CV")]
    Covers,
    #[serde(rename = "DJ")]
    Dj,
}

impl ConcertTag {
    pub const ALL: [ConcertTag; 3] = [ConcertTag::Originals, ConcertTag::Covers, ConcertTag::Dj];

    pub fn code(&self) -> &'static str {
        match self {
            ConcertTag::Originals => "OG",
            ConcertTag::Covers => "CV",
            ConcertTag::Dj => "DJ",
        }
    }
}

impl Display for ConcertTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown concert tag code: {0}")]
pub struct UnknownTag(pub String);

impl FromStr for ConcertTag {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OG" => Ok(ConcertTag::Originals),
            "CV" => Ok(ConcertTag::Covers),
            "DJ" => Ok(ConcertTag::Dj),
            _ => Err(UnknownTag(s.to_string())),
        }
    }
}

/// Moderation state of a venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueStatus {
    Unverified,
    Verified,
    Declined,
}

impl VenueStatus {
    /// A declined listing stays hidden even if the venue was verified earlier
    pub fn from_flags(is_verified: bool, declined_listing: bool) -> Self {
        match (is_verified, declined_listing) {
            (_, true) => VenueStatus::Declined,
            (true, false) => VenueStatus::Verified,
            (false, false) => VenueStatus::Unverified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub venue_id: i64,
    pub name: String,
    pub status: VenueStatus,
}

/// A performer who can appear on a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalArtist {
    pub artist_id: i64,
    pub name: String,
    /// Catalog ids the performer picked as "sounds like"
    pub chosen_analogs: BTreeSet<String>,
    /// Placeholder performer created by a concert poster and not yet claimed
    pub is_placeholder: bool,
}

impl LocalArtist {
    pub fn new<I, S>(artist_id: i64, name: impl Into<String>, analogs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            artist_id,
            name: name.into(),
            chosen_analogs: analogs.into_iter().map(Into::into).collect(),
            is_placeholder: false,
        }
    }

    pub fn placeholder(mut self) -> Self {
        self.is_placeholder = true;
        self
    }
}

/// A scheduled event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concert {
    pub concert_id: i64,
    pub date: NaiveDate,
    pub venue: Venue,
    /// Performers in set order; never empty for a visible concert
    pub bill: Vec<LocalArtist>,
    pub tags: BTreeSet<ConcertTag>,
    pub cancelled: bool,
}

impl Concert {
    /// Whether the concert may be shown to the public
    ///
    /// Cancelled concerts, concerts at unverified or declined venues and
    /// concerts billing an unclaimed placeholder performer are hidden.
    pub fn is_publicly_visible(&self) -> bool {
        !self.cancelled
            && self.venue.status == VenueStatus::Verified
            && !self.bill.is_empty()
            && self.bill.iter().all(|artist| !artist.is_placeholder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concert(status: VenueStatus, bill: Vec<LocalArtist>, cancelled: bool) -> Concert {
        Concert {
            concert_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            venue: Venue {
                venue_id: 1,
                name: "The Hideout".to_string(),
                status,
            },
            bill,
            tags: BTreeSet::from([ConcertTag::Originals]),
            cancelled,
        }
    }

    #[test]
    fn test_tag_codes_parse() {
        assert_eq!("OG".parse::<ConcertTag>(), Ok(ConcertTag::Originals));
        assert_eq!("cv".parse::<ConcertTag>(), Ok(ConcertTag::Covers));
        assert_eq!(" DJ ".parse::<ConcertTag>(), Ok(ConcertTag::Dj));
        assert!("XX".parse::<ConcertTag>().is_err());
    }

    #[test]
    fn test_tag_serde_uses_codes() {
        let json = serde_json::to_string(&ConcertTag::Covers).unwrap();
        assert_eq!(json, r#""CV""#);
    }

    #[test]
    fn test_venue_status_from_flags() {
        assert_eq!(VenueStatus::from_flags(true, false), VenueStatus::Verified);
        assert_eq!(VenueStatus::from_flags(true, true), VenueStatus::Declined);
        assert_eq!(VenueStatus::from_flags(false, false), VenueStatus::Unverified);
    }

    #[test]
    fn test_visible_concert() {
        let artist = LocalArtist::new(1, "Band", ["123"]);
        assert!(concert(VenueStatus::Verified, vec![artist], false).is_publicly_visible());
    }

    #[test]
    fn test_hidden_concerts() {
        let artist = LocalArtist::new(1, "Band", ["123"]);
        let temp = LocalArtist::new(2, "Temp", ["456"]).placeholder();

        assert!(!concert(VenueStatus::Unverified, vec![artist.clone()], false).is_publicly_visible());
        assert!(!concert(VenueStatus::Declined, vec![artist.clone()], false).is_publicly_visible());
        assert!(!concert(VenueStatus::Verified, vec![artist.clone()], true).is_publicly_visible());
        assert!(!concert(VenueStatus::Verified, vec![artist, temp], false).is_publicly_visible());
        assert!(!concert(VenueStatus::Verified, vec![], false).is_publicly_visible());
    }
}
