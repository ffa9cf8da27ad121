// Tier 2: Identifier Resolver
//
// Concept: map an unlabeled provider record (title, year, directors) to one
// canonical id, or to nothing. Never guesses: any step that leaves more than
// one candidate falls through to the next, and the last step gives up.
// Synchronization: reads tier1::MetadataStore, memoizes every lookup.
//
// Algorithm:
// 1. Title stages from the store, most precise first
// 2. Director filmography from the person index (director role only)
// 3. For each year in year, year-1, year+1, ... (up to the configured gap):
//    a. the most precise title stage with a hit in that year; one hit wins
//    b. else the director's titles of that year; one hit wins
//    c. else the intersection of (a) and (b); one hit wins
// 4. Ignoring years: first title stage that meets the filmography; one hit wins
// 5. Otherwise unresolved

use crate::config::ResolverConfig;
use crate::error::CatalogResult;
use crate::tier1::{MetadataStore, DIRECTOR_ROLE};
use crate::types::{CanonicalId, IdSet};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Years to try, nearest first
pub fn year_sequence(year: i32, gap: u32) -> Vec<i32> {
    let gap = i32::try_from(gap).unwrap_or(i32::MAX);
    let mut years = vec![year];
    for d in 1..=gap {
        years.push(year - d);
        years.push(year + d);
    }
    years
}

fn single(ids: &IdSet) -> Option<CanonicalId> {
    if ids.len() == 1 {
        ids.iter().next().cloned()
    } else {
        None
    }
}

/// Identifier resolver; one instance per run
pub struct IdentifierResolver {
    store: Arc<dyn MetadataStore>,
    config: ResolverConfig,
    titles: HashMap<String, Vec<IdSet>>,
    persons: HashMap<String, BTreeSet<String>>,
    filmographies: HashMap<BTreeSet<String>, IdSet>,
    years: HashMap<CanonicalId, Option<i32>>,
}

impl IdentifierResolver {
    pub fn new(store: Arc<dyn MetadataStore>, config: ResolverConfig) -> Self {
        Self {
            store,
            config,
            titles: HashMap::new(),
            persons: HashMap::new(),
            filmographies: HashMap::new(),
            years: HashMap::new(),
        }
    }

    /// Resolve a record to a canonical id
    ///
    /// `duration` only shows up in logs; it never picks between candidates.
    pub async fn resolve(
        &mut self,
        title: &str,
        year: Option<i32>,
        directors: &[String],
        duration: Option<u32>,
    ) -> CatalogResult<Option<CanonicalId>> {
        let stages = self.title_stages(title).await?;
        let filmography = self.director_movies(directors).await?;

        if let Some(year) = year {
            let mut known: IdSet = stages.iter().flatten().cloned().collect();
            known.extend(filmography.iter().cloned());
            self.load_years(&known).await?;

            for y in year_sequence(year, self.config.year_gap) {
                let by_title = stages
                    .iter()
                    .map(|stage| self.in_year(stage, y))
                    .find(|ids| !ids.is_empty())
                    .unwrap_or_default();
                if let Some(id) = single(&by_title) {
                    tracing::trace!(title, year = y, id = %id, "Resolved by title and year");
                    return Ok(Some(id));
                }

                let by_director = self.in_year(&filmography, y);
                if let Some(id) = single(&by_director) {
                    tracing::trace!(title, year = y, id = %id, "Resolved by director and year");
                    return Ok(Some(id));
                }

                let both: IdSet = by_title.intersection(&by_director).cloned().collect();
                if let Some(id) = single(&both) {
                    tracing::trace!(title, year = y, id = %id, "Resolved by title, director and year");
                    return Ok(Some(id));
                }
            }
        }

        for stage in &stages {
            let both: IdSet = stage.intersection(&filmography).cloned().collect();
            if both.is_empty() {
                continue;
            }
            if let Some(id) = single(&both) {
                tracing::trace!(title, id = %id, "Resolved by title and director");
                return Ok(Some(id));
            }
            tracing::debug!(
                title,
                ?year,
                ?duration,
                candidates = both.len(),
                "Ambiguous resolution, leaving unresolved"
            );
            return Ok(None);
        }

        tracing::debug!(
            title,
            ?year,
            ?duration,
            title_stages = stages.len(),
            director_titles = filmography.len(),
            "No unique match, leaving unresolved"
        );
        Ok(None)
    }

    fn in_year(&self, ids: &IdSet, year: i32) -> IdSet {
        ids.iter()
            .filter(|id| self.years.get(*id).copied().flatten() == Some(year))
            .cloned()
            .collect()
    }

    async fn title_stages(&mut self, title: &str) -> CatalogResult<Vec<IdSet>> {
        let key = title.trim().to_lowercase();
        if let Some(stages) = self.titles.get(&key) {
            return Ok(stages.clone());
        }
        let stages = self.store.search_title(&key).await?;
        self.titles.insert(key, stages.clone());
        Ok(stages)
    }

    async fn director_movies(&mut self, directors: &[String]) -> CatalogResult<IdSet> {
        let mut persons = BTreeSet::new();
        for name in directors {
            let key = name.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            if !self.persons.contains_key(&key) {
                let found = self.store.search_person(&key, DIRECTOR_ROLE).await?;
                self.persons.insert(key.clone(), found);
            }
            if let Some(found) = self.persons.get(&key) {
                persons.extend(found.iter().cloned());
            }
        }

        if persons.is_empty() {
            return Ok(IdSet::new());
        }
        if let Some(ids) = self.filmographies.get(&persons) {
            return Ok(ids.clone());
        }
        let ids = self.store.movies_by_person(&persons, DIRECTOR_ROLE).await?;
        self.filmographies.insert(persons, ids.clone());
        Ok(ids)
    }

    async fn load_years(&mut self, ids: &IdSet) -> CatalogResult<()> {
        let missing: IdSet = ids
            .iter()
            .filter(|id| !self.years.contains_key(*id))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let found = self.store.release_years(&missing).await?;
        for id in missing {
            let year = found.get(&id).copied();
            self.years.insert(id, year);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CanonicalInfo;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Movie {
        id: &'static str,
        title: &'static str,
        year: i32,
        director: &'static str,
    }

    /// Store with the same staged matching as the SQLite one
    #[derive(Default)]
    struct MemoryStore {
        movies: Vec<Movie>,
        calls: AtomicU32,
    }

    fn stage_match(stage: usize, stored: &str, query: &str) -> bool {
        let stored = stored.to_lowercase();
        match stage {
            0 => stored == query,
            1 => query.contains(&stored),
            _ => stored.contains(query),
        }
    }

    #[async_trait]
    impl MetadataStore for MemoryStore {
        async fn search_title(&self, title: &str) -> CatalogResult<Vec<IdSet>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut out = Vec::new();
            for stage in 0..3 {
                let ids: IdSet = self
                    .movies
                    .iter()
                    .filter(|m| stage_match(stage, m.title, title))
                    .filter_map(|m| CanonicalId::parse(m.id))
                    .collect();
                if !ids.is_empty() {
                    out.push(ids);
                }
            }
            Ok(out)
        }

        async fn search_person(&self, name: &str, _role: &str) -> CatalogResult<BTreeSet<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for stage in 0..3 {
                let found: BTreeSet<String> = self
                    .movies
                    .iter()
                    .filter(|m| stage_match(stage, m.director, name))
                    .map(|m| m.director.to_string())
                    .collect();
                if !found.is_empty() {
                    return Ok(found);
                }
            }
            Ok(BTreeSet::new())
        }

        async fn movies_by_person(
            &self,
            persons: &BTreeSet<String>,
            _role: &str,
        ) -> CatalogResult<IdSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .movies
                .iter()
                .filter(|m| persons.contains(m.director))
                .filter_map(|m| CanonicalId::parse(m.id))
                .collect())
        }

        async fn release_years(&self, ids: &IdSet) -> CatalogResult<BTreeMap<CanonicalId, i32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .movies
                .iter()
                .filter_map(|m| CanonicalId::parse(m.id).map(|id| (id, m.year)))
                .filter(|(id, _)| ids.contains(id))
                .collect())
        }

        async fn lookup(&self, _ids: &IdSet) -> CatalogResult<BTreeMap<CanonicalId, CanonicalInfo>> {
            Ok(BTreeMap::new())
        }
    }

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore {
            movies: vec![
                Movie { id: "tt0034583", title: "Casablanca", year: 1942, director: "Michael Curtiz" },
                Movie { id: "tt0050001", title: "Casablanca", year: 1955, director: "John Doe" },
                Movie { id: "tt0060001", title: "Mama", year: 2021, director: "Ana Ruiz" },
                Movie { id: "tt0060002", title: "Mama", year: 2021, director: "Luis Gil" },
                Movie { id: "tt0060003", title: "Otra", year: 2021, director: "Luis Gil" },
                Movie { id: "tt0070001", title: "Solo", year: 2000, director: "Eva Sanz" },
                Movie { id: "tt0070002", title: "Solo", year: 2005, director: "Eva Sanz" },
            ],
            calls: AtomicU32::new(0),
        })
    }

    fn resolver(store: Arc<MemoryStore>) -> IdentifierResolver {
        IdentifierResolver::new(store, ResolverConfig::default())
    }

    fn id(s: &str) -> CanonicalId {
        CanonicalId::parse(s).unwrap()
    }

    #[test]
    fn test_year_sequence_nearest_first() {
        assert_eq!(year_sequence(1942, 2), vec![1942, 1941, 1943, 1940, 1944]);
        assert_eq!(year_sequence(1942, 0), vec![1942]);
    }

    #[tokio::test]
    async fn test_title_and_year_resolve() {
        let mut r = resolver(store());
        let found = r.resolve("Casablanca", Some(1942), &[], Some(102)).await.unwrap();
        assert_eq!(found, Some(id("tt0034583")));
    }

    #[tokio::test]
    async fn test_adjacent_year_tolerated() {
        let mut r = resolver(store());
        let found = r.resolve("casablanca", Some(1943), &[], None).await.unwrap();
        assert_eq!(found, Some(id("tt0034583")));
    }

    #[tokio::test]
    async fn test_director_breaks_title_tie() {
        let mut r = resolver(store());
        let directors = vec!["Ana Ruiz".to_string()];
        let found = r.resolve("Mama", Some(2021), &directors, None).await.unwrap();
        assert_eq!(found, Some(id("tt0060001")));
    }

    #[tokio::test]
    async fn test_intersection_breaks_double_tie() {
        let mut r = resolver(store());
        // two "Mama" in 2021, Luis Gil directed two titles in 2021, one of them "Mama"
        let directors = vec!["Luis Gil".to_string()];
        let found = r.resolve("Mama", Some(2021), &directors, None).await.unwrap();
        assert_eq!(found, Some(id("tt0060002")));
    }

    #[tokio::test]
    async fn test_ambiguous_stays_unresolved() {
        let mut r = resolver(store());
        assert_eq!(r.resolve("Mama", Some(2021), &[], None).await.unwrap(), None);
        assert_eq!(r.resolve("Mama", None, &[], None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_title_unresolved() {
        let mut r = resolver(store());
        let found = r.resolve("Unknown Film X", Some(2023), &[], Some(90)).await.unwrap();
        assert_eq!(found, None);
    }

    #[tokio::test]
    async fn test_year_out_of_gap_falls_back_to_director() {
        let mut r = resolver(store());
        let directors = vec!["Eva Sanz".to_string()];
        // no year within ±1 of 2010; both "Solo" are Eva Sanz's, stays ambiguous
        assert_eq!(r.resolve("Solo", Some(2010), &directors, None).await.unwrap(), None);
        // "Casablanca" without year, Curtiz picks one
        let curtiz = vec!["Curtiz".to_string()];
        assert_eq!(
            r.resolve("Casablanca", None, &curtiz, None).await.unwrap(),
            Some(id("tt0034583"))
        );
    }

    #[tokio::test]
    async fn test_duration_does_not_narrow() {
        let mut r = resolver(store());
        assert_eq!(r.resolve("Mama", Some(2021), &[], Some(95)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lookups_are_memoized() {
        let store = store();
        let mut r = resolver(store.clone());
        let directors = vec!["Ana Ruiz".to_string()];

        r.resolve("Mama", Some(2021), &directors, None).await.unwrap();
        let calls = store.calls.load(Ordering::SeqCst);
        let again = r.resolve("Mama", Some(2021), &directors, None).await.unwrap();

        assert_eq!(again, Some(id("tt0060001")));
        assert_eq!(store.calls.load(Ordering::SeqCst), calls);
    }
}
