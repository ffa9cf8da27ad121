//! # CineBoot Common Library
//!
//! Shared code for the CineBoot catalog tools including:
//! - Error types shared across crates
//! - Bootstrap configuration loading (TOML, environment, OS defaults)
//! - Date and timestamp helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
