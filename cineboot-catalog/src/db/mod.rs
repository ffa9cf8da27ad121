//! Database access for cineboot-catalog
//!
//! The metadata snapshot is an IMDb-derived SQLite file that is never
//! written by the catalog run.

pub mod schema;

use crate::error::{CatalogError, CatalogResult};
use sqlx::SqlitePool;
use std::path::Path;

/// Open the metadata snapshot read-only
///
/// `immutable=1` lets SQLite skip locking entirely; the file must not change
/// while the run holds the pool.
pub async fn open_metadata_pool(db_path: &Path) -> CatalogResult<SqlitePool> {
    if !db_path.exists() {
        return Err(CatalogError::Config(format!(
            "Metadata database not found: {}",
            db_path.display()
        )));
    }

    let db_url = format!("sqlite://{}?mode=ro&immutable=1", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    Ok(pool)
}

/// Create (or open) a writable metadata database and make sure its tables exist
///
/// Used to build snapshots and test fixtures.
pub async fn init_metadata_pool(db_path: &Path) -> CatalogResult<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    schema::create_tables(&pool).await?;

    Ok(pool)
}
