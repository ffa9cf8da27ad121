//! Metadata Snapshot Test Utilities
//!
//! Builds a small IMDb-style SQLite snapshot in a temp directory.

use anyhow::Result;
use cineboot_catalog::db::init_metadata_pool;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// One row of the `movie` table plus everything hanging off it
#[derive(Debug, Clone)]
pub struct SnapshotFilm {
    pub id: &'static str,
    pub kind: &'static str,
    pub year: Option<i64>,
    pub rating: Option<f64>,
    pub titles: Vec<&'static str>,
    /// (person id, name)
    pub directors: Vec<(&'static str, &'static str)>,
    pub genres: Vec<&'static str>,
    /// Space-separated, as stored in `extra`
    pub countries: Option<&'static str>,
}

impl SnapshotFilm {
    pub fn movie(id: &'static str, title: &'static str, year: i64) -> Self {
        Self {
            id,
            kind: "movie",
            year: Some(year),
            rating: None,
            titles: vec![title],
            directors: Vec::new(),
            genres: Vec::new(),
            countries: None,
        }
    }

    pub fn kind(mut self, kind: &'static str) -> Self {
        self.kind = kind;
        self
    }

    pub fn rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn also_titled(mut self, title: &'static str) -> Self {
        self.titles.push(title);
        self
    }

    pub fn directed_by(mut self, person: &'static str, name: &'static str) -> Self {
        self.directors.push((person, name));
        self
    }

    pub fn genre(mut self, genre: &'static str) -> Self {
        self.genres.push(genre);
        self
    }

    pub fn countries(mut self, countries: &'static str) -> Self {
        self.countries = Some(countries);
        self
    }
}

/// Create an empty snapshot with the metadata schema
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_snapshot() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let pool = init_metadata_pool(&temp_dir.path().join("imdb.sqlite")).await?;
    Ok((temp_dir, pool))
}

/// Insert `films` into the snapshot
pub async fn insert_films(pool: &SqlitePool, films: &[SnapshotFilm]) -> Result<()> {
    for film in films {
        sqlx::query("INSERT INTO movie (id, type, year, rating, votes) VALUES (?, ?, ?, ?, ?)")
            .bind(film.id)
            .bind(film.kind)
            .bind(film.year)
            .bind(film.rating)
            .bind(film.rating.map(|_| 1000_i64))
            .execute(pool)
            .await?;

        for title in &film.titles {
            sqlx::query("INSERT INTO title (movie, title) VALUES (?, ?)")
                .bind(film.id)
                .bind(*title)
                .execute(pool)
                .await?;
        }

        for (person, name) in &film.directors {
            sqlx::query("INSERT OR IGNORE INTO person (id, name) VALUES (?, ?)")
                .bind(*person)
                .bind(*name)
                .execute(pool)
                .await?;
            sqlx::query("INSERT INTO worker (movie, person, category) VALUES (?, ?, 'director')")
                .bind(film.id)
                .bind(*person)
                .execute(pool)
                .await?;
        }

        for genre in &film.genres {
            sqlx::query("INSERT INTO genre (movie, genre) VALUES (?, ?)")
                .bind(film.id)
                .bind(*genre)
                .execute(pool)
                .await?;
        }

        if let Some(countries) = film.countries {
            sqlx::query("INSERT INTO extra (movie, countries) VALUES (?, ?)")
                .bind(film.id)
                .bind(countries)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}

/// The catalog used by the pipeline scenarios
pub fn catalog_films() -> Vec<SnapshotFilm> {
    vec![
        SnapshotFilm::movie("tt0034583", "Casablanca", 1942)
            .rating(8.5)
            .directed_by("nm0002031", "Michael Curtiz")
            .genre("Drama")
            .countries("USA"),
        SnapshotFilm::movie("tt0903747", "Breaking Bad", 2008)
            .kind("tvSeries")
            .rating(9.5)
            .countries("USA"),
        SnapshotFilm::movie("tt0100001", "El bosque animado", 2019)
            .rating(6.2)
            .directed_by("nm0100001", "Ana Ruiz")
            .countries("ESP"),
        SnapshotFilm::movie("tt0100002", "Mal rodaje", 2015)
            .rating(2.9)
            .directed_by("nm0100002", "Pedro Gil")
            .countries("ESP"),
        SnapshotFilm::movie("tt0100003", "Mama", 2013).rating(6.2),
        SnapshotFilm::movie("tt0100004", "Mama", 2013).rating(5.5),
        SnapshotFilm::movie("tt0100005", "La frontera", 2018)
            .rating(7.1)
            .directed_by("nm0100005", "Lucía Prat")
            .countries("ESP FRA"),
    ]
}

/// Snapshot seeded with [`catalog_films`]
pub async fn seed_catalog_snapshot() -> Result<(TempDir, SqlitePool)> {
    let (dir, pool) = create_test_snapshot().await?;
    insert_films(&pool, &catalog_films()).await?;
    Ok((dir, pool))
}
