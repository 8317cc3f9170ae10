pub mod catalog;
pub mod concert;
pub mod query;
pub mod subscriber;

pub use catalog::{CatalogArtist, SimilarityMap, SimilaritySnapshot};
pub use concert::{Concert, ConcertTag, LocalArtist, UnknownTag, Venue, VenueStatus};
pub use query::{DateFilter, References, SearchQuery, TagFilter};
pub use subscriber::Subscriber;
