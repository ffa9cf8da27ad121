//! cineboot-catalog library interface
//!
//! Cross-source identity resolution and consensus merge for the film
//! catalog. Three tiers with explicit contracts between them:
//!
//! ## Tier 1: Sources
//! - `metadata_store` - read-only IMDb snapshot
//! - `attribute_client` - OMDb attribute API
//! - `knowledge_client` - Wikidata SPARQL
//! - `record_feed` - provider listings
//! - `kv_store` - caches kept between runs
//!
//! ## Tier 2: Identity and Consensus
//! - `identifier_resolver` - record → canonical id
//! - `consensus` - stable answers from a non-deterministic service
//!
//! ## Tier 3: Catalog
//! - `admission_gate` - rule-based filtering
//! - `merge_engine` - deduplication and primary election
//! - `enrichment` - backfill of missing attributes
//!
//! `catalog_pipeline` wires the tiers into one batch run.

pub mod catalog_pipeline;
pub mod config;
pub mod db;
pub mod error;
pub mod tier1;
pub mod tier2;
pub mod tier3;
pub mod types;
pub mod utils;

pub use crate::catalog_pipeline::{CatalogCaches, CatalogPipeline, CatalogSources};
pub use crate::config::CatalogConfig;
pub use crate::error::{CatalogError, CatalogResult};
