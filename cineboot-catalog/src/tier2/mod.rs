// Tier 2: Identity and Consensus
//
// Modules in this tier turn raw tier 1 answers into decisions:
//   identifier_resolver - record → canonical id, or nothing
//   consensus           - stable answer out of a non-deterministic service

pub mod consensus;
pub mod identifier_resolver;

pub use consensus::{ConsensusObservation, ConsensusSampler, ConsensusValue, StableKnowledge};
pub use identifier_resolver::IdentifierResolver;
