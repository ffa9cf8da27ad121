// Tier 1: Metadata Store Client
//
// Read-only queries against the IMDb-derived SQLite snapshot. Text matching
// is staged from most to least precise:
//   1. exact, case-insensitive
//   2. stored text contained in the query
//   3. query contained in the stored text
//
// No caching here: the identifier resolver owns the memo maps for a run.

use crate::error::CatalogResult;
use crate::types::{CanonicalId, CanonicalInfo, IdSet, TitleType};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::{BTreeMap, BTreeSet};

/// Role name of directors in the `worker` table
pub const DIRECTOR_ROLE: &str = "director";

/// Stage predicates, most precise first; `?` is the lowercased query
const STAGES: [&str; 3] = [
    "lower({col}) = ?",
    "? LIKE ('%' || lower({col}) || '%')",
    "lower({col}) LIKE ('%' || ? || '%')",
];

/// Bound parameters per IN (...) list
const CHUNK: usize = 500;

/// Canonical metadata source
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Staged title search
    ///
    /// Returns one id set per stage that matched anything, most precise
    /// first. Empty when the title is blank or nothing matched.
    async fn search_title(&self, title: &str) -> CatalogResult<Vec<IdSet>>;

    /// Person ids matching `name` with `role` on at least one title; the
    /// first stage that matches decides
    async fn search_person(&self, name: &str, role: &str) -> CatalogResult<BTreeSet<String>>;

    /// Titles on which any of `persons` worked with `role`
    async fn movies_by_person(&self, persons: &BTreeSet<String>, role: &str)
        -> CatalogResult<IdSet>;

    /// Release year of each id that has one
    async fn release_years(&self, ids: &IdSet) -> CatalogResult<BTreeMap<CanonicalId, i32>>;

    /// Canonical attributes of each id present in the store
    async fn lookup(&self, ids: &IdSet) -> CatalogResult<BTreeMap<CanonicalId, CanonicalInfo>>;
}

/// SQLite-backed metadata store
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn staged_strings(&self, sql: &str, col: &str, query: &str, extra: Option<&str>)
        -> CatalogResult<Option<Vec<String>>>
    {
        for stage in STAGES {
            let predicate = stage.replace("{col}", col);
            let sql = sql.replace("{where}", &predicate);
            let mut q = sqlx::query_scalar::<_, String>(&sql).bind(query);
            if let Some(extra) = extra {
                q = q.bind(extra);
            }
            let found = q.fetch_all(&self.pool).await?;
            if !found.is_empty() {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn to_ids(raw: impl IntoIterator<Item = String>) -> IdSet {
    raw.into_iter()
        .filter_map(|s| {
            let id = CanonicalId::parse(&s);
            if id.is_none() {
                tracing::debug!(raw = %s, "Skipping malformed title id in metadata store");
            }
            id
        })
        .collect()
}

fn split_countries(raw: Option<String>) -> Vec<String> {
    raw.map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn search_title(&self, title: &str) -> CatalogResult<Vec<IdSet>> {
        let query = normalize(title);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stages = Vec::new();
        for stage in STAGES {
            let sql = format!(
                "SELECT DISTINCT movie FROM title WHERE {}",
                stage.replace("{col}", "title")
            );
            let found: Vec<String> = sqlx::query_scalar(&sql)
                .bind(&query)
                .fetch_all(&self.pool)
                .await?;
            let ids = to_ids(found);
            if !ids.is_empty() {
                stages.push(ids);
            }
        }

        tracing::trace!(title = %query, stages = stages.len(), "Title search");
        Ok(stages)
    }

    async fn search_person(&self, name: &str, role: &str) -> CatalogResult<BTreeSet<String>> {
        let query = normalize(name);
        if query.is_empty() {
            return Ok(BTreeSet::new());
        }

        let found = self
            .staged_strings(
                "SELECT id FROM person WHERE {where} \
                 AND id IN (SELECT person FROM worker WHERE category = ?)",
                "name",
                &query,
                Some(role),
            )
            .await?;

        Ok(found.unwrap_or_default().into_iter().collect())
    }

    async fn movies_by_person(
        &self,
        persons: &BTreeSet<String>,
        role: &str,
    ) -> CatalogResult<IdSet> {
        let persons: Vec<&String> = persons.iter().collect();
        let mut ids = IdSet::new();

        for chunk in persons.chunks(CHUNK) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT DISTINCT movie FROM worker WHERE category = ");
            qb.push_bind(role.to_string());
            qb.push(" AND person IN (");
            let mut sep = qb.separated(", ");
            for p in chunk {
                sep.push_bind(p.to_string());
            }
            sep.push_unseparated(")");

            let found: Vec<String> = qb.build_query_scalar().fetch_all(&self.pool).await?;
            ids.extend(to_ids(found));
        }

        Ok(ids)
    }

    async fn release_years(&self, ids: &IdSet) -> CatalogResult<BTreeMap<CanonicalId, i32>> {
        let ids: Vec<&CanonicalId> = ids.iter().collect();
        let mut years = BTreeMap::new();

        for chunk in ids.chunks(CHUNK) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT id, year FROM movie WHERE year IS NOT NULL AND id IN (");
            let mut sep = qb.separated(", ");
            for id in chunk {
                sep.push_bind(id.to_string());
            }
            sep.push_unseparated(")");

            let rows: Vec<(String, i64)> = qb.build_query_as().fetch_all(&self.pool).await?;
            for (id, year) in rows {
                if let (Some(id), Ok(year)) = (CanonicalId::parse(&id), i32::try_from(year)) {
                    years.insert(id, year);
                }
            }
        }

        Ok(years)
    }

    async fn lookup(&self, ids: &IdSet) -> CatalogResult<BTreeMap<CanonicalId, CanonicalInfo>> {
        type Row = (
            String,
            Option<String>,
            Option<i64>,
            Option<i64>,
            Option<f64>,
            Option<i64>,
            i64,
            Option<String>,
        );

        let ids: Vec<&CanonicalId> = ids.iter().collect();
        let mut infos = BTreeMap::new();

        for chunk in ids.chunks(CHUNK) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT m.id, m.type, m.year, m.duration, m.rating, m.votes, m.awards, e.countries \
                 FROM movie m LEFT JOIN extra e ON e.movie = m.id WHERE m.id IN (",
            );
            let mut sep = qb.separated(", ");
            for id in chunk {
                sep.push_bind(id.to_string());
            }
            sep.push_unseparated(")");

            let rows: Vec<Row> = qb.build_query_as().fetch_all(&self.pool).await?;
            for (id, kind, year, duration, rating, votes, awards, countries) in rows {
                let Some(id) = CanonicalId::parse(&id) else {
                    continue;
                };
                let mut info = CanonicalInfo::new(id.clone());
                info.title_type = kind.as_deref().map(TitleType::parse);
                info.year = year.and_then(|y| i32::try_from(y).ok());
                info.runtime = duration.and_then(|d| u32::try_from(d).ok());
                info.rating = rating.filter(|r| *r >= 0.0);
                info.votes = votes.and_then(|v| u64::try_from(v).ok());
                info.has_awards = awards > 0;
                info.countries = split_countries(countries);
                infos.insert(id, info);
            }

            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT movie, genre FROM genre WHERE movie IN (");
            let mut sep = qb.separated(", ");
            for id in chunk {
                sep.push_bind(id.to_string());
            }
            sep.push_unseparated(") ORDER BY rowid");

            let genres: Vec<(String, String)> = qb.build_query_as().fetch_all(&self.pool).await?;
            for (id, genre) in genres {
                if let Some(info) = CanonicalId::parse(&id).and_then(|id| infos.get_mut(&id)) {
                    if !info.genres.contains(&genre) {
                        info.genres.push(genre);
                    }
                }
            }
        }

        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_metadata_pool;
    use tempfile::TempDir;

    async fn fixture() -> (TempDir, SqliteMetadataStore) {
        let dir = TempDir::new().unwrap();
        let pool = init_metadata_pool(&dir.path().join("imdb.sqlite")).await.unwrap();

        for sql in [
            "INSERT INTO movie VALUES ('tt0034583', 'movie', 1942, 102, 8.5, 600000, 1)",
            "INSERT INTO movie VALUES ('tt0111111', 'movie', 1943, 90, 5.0, 100, 0)",
            "INSERT INTO movie VALUES ('tt0222222', 'tvSeries', 1990, NULL, 7.0, 50, 0)",
            "INSERT INTO title VALUES ('tt0034583', 'Casablanca')",
            "INSERT INTO title VALUES ('tt0111111', 'Casablanca Express')",
            "INSERT INTO title VALUES ('tt0222222', 'Blanca')",
            "INSERT INTO person VALUES ('nm0001', 'Michael Curtiz')",
            "INSERT INTO person VALUES ('nm0002', 'Curtis Curtiz')",
            "INSERT INTO worker VALUES ('tt0034583', 'nm0001', 'director')",
            "INSERT INTO worker VALUES ('tt0111111', 'nm0002', 'actor')",
            "INSERT INTO genre VALUES ('tt0034583', 'Drama')",
            "INSERT INTO genre VALUES ('tt0034583', 'Romance')",
            "INSERT INTO extra VALUES ('tt0034583', 370936, NULL, 'USA')",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }

        (dir, SqliteMetadataStore::new(pool))
    }

    fn id(s: &str) -> CanonicalId {
        CanonicalId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_search_title_stages_most_precise_first() {
        let (_dir, store) = fixture().await;

        let stages = store.search_title("  CASABLANCA ").await.unwrap();
        // exact, then "blanca" is contained in the query, then query contained in "Casablanca Express"
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0], IdSet::from([id("tt0034583")]));
        assert!(stages[1].contains(&id("tt0222222")));
        assert!(stages[2].contains(&id("tt0111111")));
    }

    #[tokio::test]
    async fn test_search_title_blank_is_empty() {
        let (_dir, store) = fixture().await;
        assert!(store.search_title("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_person_filters_role() {
        let (_dir, store) = fixture().await;

        let found = store.search_person("curtiz", DIRECTOR_ROLE).await.unwrap();
        assert_eq!(found, BTreeSet::from(["nm0001".to_string()]));

        let movies = store.movies_by_person(&found, DIRECTOR_ROLE).await.unwrap();
        assert_eq!(movies, IdSet::from([id("tt0034583")]));
    }

    #[tokio::test]
    async fn test_release_years_and_lookup() {
        let (_dir, store) = fixture().await;
        let ids = IdSet::from([id("tt0034583"), id("tt0222222"), id("tt9999999")]);

        let years = store.release_years(&ids).await.unwrap();
        assert_eq!(years.get(&id("tt0034583")), Some(&1942));
        assert!(!years.contains_key(&id("tt9999999")));

        let infos = store.lookup(&ids).await.unwrap();
        let casablanca = &infos[&id("tt0034583")];
        assert_eq!(casablanca.title_type, Some(TitleType::Movie));
        assert!(casablanca.has_awards);
        assert_eq!(casablanca.countries, vec!["USA".to_string()]);
        assert_eq!(casablanca.genres, vec!["Drama".to_string(), "Romance".to_string()]);
        assert_eq!(infos[&id("tt0222222")].title_type, Some(TitleType::TvSeries));
        assert_eq!(infos.len(), 2);
    }
}
