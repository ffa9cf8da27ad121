//! Metadata snapshot schema
//!
//! Tables:
//! - `movie`: one row per title id with classification, year and rating
//! - `title`: every known title (original and localized) of a movie
//! - `person` / `worker`: people and their role on each movie
//! - `extra`: cross-reference data (FilmAffinity id, Wikipedia article,
//!   space-separated country codes)

use sqlx::SqlitePool;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS movie (
        id TEXT PRIMARY KEY,
        type TEXT,
        year INTEGER,
        duration INTEGER,
        rating REAL,
        votes INTEGER,
        awards INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS title (
        movie TEXT NOT NULL REFERENCES movie(id),
        title TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS person (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS worker (
        movie TEXT NOT NULL REFERENCES movie(id),
        person TEXT NOT NULL REFERENCES person(id),
        category TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS genre (
        movie TEXT NOT NULL REFERENCES movie(id),
        genre TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS extra (
        movie TEXT PRIMARY KEY REFERENCES movie(id),
        filmaffinity INTEGER,
        wikipedia TEXT,
        countries TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_title_movie ON title(movie)",
    "CREATE INDEX IF NOT EXISTS idx_worker_person ON worker(person, category)",
];

pub async fn create_tables(pool: &SqlitePool) -> sqlx::Result<()> {
    for ddl in TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }
    tracing::debug!("Metadata tables initialized (movie, title, person, worker, genre, extra)");
    Ok(())
}
