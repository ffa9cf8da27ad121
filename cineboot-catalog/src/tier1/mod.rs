// Tier 1: Independent Sources
//
// Each module wraps exactly one external source behind a trait so the
// upper tiers can run against mocks:
//   metadata_store   - read-only IMDb snapshot (SQLite)
//   attribute_client - OMDb attribute API
//   knowledge_client - Wikidata SPARQL (non-deterministic, see tier2::consensus)
//   record_feed      - provider listings
//   kv_store         - caches persisted between runs

pub mod attribute_client;
pub mod knowledge_client;
pub mod kv_store;
pub mod metadata_store;
pub mod record_feed;

pub use attribute_client::{AttributeSource, OmdbClient};
pub use knowledge_client::{KnowledgeAnswer, KnowledgeService, WikidataClient};
pub use kv_store::{JsonKvStore, KvStore};
pub use metadata_store::{MetadataStore, SqliteMetadataStore, DIRECTOR_ROLE};
pub use record_feed::{JsonRecordFeed, RecordFeed, VecRecordFeed};
