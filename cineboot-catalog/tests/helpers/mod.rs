//! Test Helper Utilities
//!
//! Shared utilities for testing cineboot-catalog

#![allow(dead_code)]

pub mod db_utils;
pub mod mock_services;
pub mod records;

// Re-export commonly used items
pub use db_utils::{
    catalog_films, create_test_snapshot, insert_films, seed_catalog_snapshot, SnapshotFilm,
};
pub use mock_services::{answer, MockAttributes, Reply, ScriptedKnowledge};
pub use records::{day, RecordBuilder};
