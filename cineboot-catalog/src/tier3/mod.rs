// Tier 3: Admission, Merge and Enrichment
//
//   admission_gate - which records may enter the catalog
//   merge_engine   - one film per canonical id, deterministic election
//   enrichment     - backfill of empty fields from external sources

pub mod admission_gate;
pub mod enrichment;
pub mod merge_engine;

pub use admission_gate::{Admission, AdmissionGate, GateRule};
pub use enrichment::EnrichmentPipeline;
pub use merge_engine::MergeEngine;
