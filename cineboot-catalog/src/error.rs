//! Error types for cineboot-catalog
//!
//! Record-scoped failures (`ExternalServiceUnavailable`) drop one record and
//! let the run continue. `MalformedUpstreamRecord` aborts the whole run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// A provider record is missing a field the core cannot work without
    #[error("Malformed record from {provider} (id {id:?}): {problem}")]
    MalformedUpstreamRecord {
        provider: String,
        id: String,
        problem: String,
    },

    /// Retry or sampling budget exhausted on an external call
    #[error("{service} unavailable for {key}: {reason}")]
    ExternalServiceUnavailable {
        service: &'static str,
        key: String,
        reason: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Common error: {0}")]
    Common(#[from] cineboot_common::Error),
}

impl CatalogError {
    pub fn unavailable(service: &'static str, key: impl Into<String>, reason: impl ToString) -> Self {
        Self::ExternalServiceUnavailable {
            service,
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that only invalidate the record being processed
    pub fn is_record_scoped(&self) -> bool {
        matches!(self, Self::ExternalServiceUnavailable { .. })
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
