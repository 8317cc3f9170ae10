pub mod catalog;
pub mod concerts;
pub mod memory;
pub mod postgres;
pub mod subscribers;

pub use catalog::{CatalogRepository, PgCatalogRepository};
pub use concerts::{ConcertSource, PgConcertSource};
pub use memory::{InMemoryCatalog, InMemoryConcerts, InMemorySubscribers};
pub use postgres::{create_pool, run_migrations};
pub use subscribers::{PgSubscriberSource, SubscriberSource};
