pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod poller;
pub mod record;
pub mod utils;

// Re-export the pieces a binary needs to assemble a poller
pub use api::{ApiClient, Fetcher, SourceKind};
pub use cache::{open_store, KeyValueStore, MemoryCache, RedisCache};
pub use config::Config;
pub use error::PollerError;
pub use poller::{CycleReport, Poller, UpsertOutcome};
pub use record::{CacheKeyTemplate, NormalizedRecord};
