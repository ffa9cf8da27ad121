// Tier 3: Enrichment Pipeline
//
// Concept: backfill what the merged film is missing without touching what it
// already knows.
// Synchronization: accepts a CanonicalFilm, returns the enriched copy.
//
// Steps:
// 1. Attributes: one attribute API call per canonical id, made only when
//    cast, directors or genres are empty; fills empty fields only (poster
//    and rating included)
// 2. Countries: unless there is exactly one, ask the knowledge service
//    through the consensus layer; a single answered country replaces the
//    set, a multi-country answer narrows the current set to one if it can,
//    and fills an empty set otherwise
// 3. Cross-references (Wikipedia, FilmAffinity) from the same answer
// 4. Publication date: earliest of observed and persisted per member,
//    written back to the publication log
// 5. Expiration date: dropped once in the past
//
// Running a film through twice gives the same film.

use crate::config::{ConsensusConfig, Vocabulary};
use crate::error::CatalogResult;
use crate::tier1::{AttributeSource, KnowledgeAnswer, KnowledgeService, KvStore};
use crate::tier2::StableKnowledge;
use crate::types::{dedup, Attributes, CanonicalFilm, CanonicalId, SecondaryRating};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

pub struct EnrichmentPipeline {
    attributes: Arc<dyn AttributeSource>,
    knowledge: StableKnowledge<Arc<dyn KnowledgeService>>,
    vocabulary: Vocabulary,
    publications: Box<dyn KvStore<NaiveDate>>,
    /// Attribute answers of this run, misses included
    attribute_memo: HashMap<CanonicalId, Option<Attributes>>,
    /// Processing date of the run
    today: NaiveDate,
}

impl EnrichmentPipeline {
    pub fn new(
        attributes: Arc<dyn AttributeSource>,
        knowledge: Arc<dyn KnowledgeService>,
        consensus: ConsensusConfig,
        vocabulary: Vocabulary,
        publications: Box<dyn KvStore<NaiveDate>>,
        today: NaiveDate,
    ) -> Self {
        Self {
            attributes,
            knowledge: StableKnowledge::new(knowledge, consensus),
            vocabulary,
            publications,
            attribute_memo: HashMap::new(),
            today,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Enrich one film; an `Err` means the film has to be dropped
    pub async fn enrich(&mut self, film: CanonicalFilm) -> CatalogResult<CanonicalFilm> {
        let film = self.fill_attributes(film).await?;
        let film = self.fill_countries_and_references(film).await?;
        let film = self.settle_publication(film);
        Ok(self.expire(film))
    }

    /// Persist the publication log
    pub fn flush(&mut self) -> CatalogResult<()> {
        self.publications.flush()
    }

    /// Attribute API answer for `id`, fetched at most once per run
    pub async fn attributes_for(&mut self, id: &CanonicalId) -> CatalogResult<Option<Attributes>> {
        if let Some(cached) = self.attribute_memo.get(id) {
            return Ok(cached.clone());
        }
        let fetched = self.attributes.get(id).await?;
        self.attribute_memo.insert(id.clone(), fetched.clone());
        Ok(fetched)
    }

    async fn fill_attributes(&mut self, film: CanonicalFilm) -> CatalogResult<CanonicalFilm> {
        let Some(id) = film.canonical_id.clone() else {
            return Ok(film);
        };
        let missing = film.cast.is_empty() || film.directors.is_empty() || film.genres.is_empty();
        if !missing {
            return Ok(film);
        }

        let Some(attrs) = self.attributes_for(&id).await? else {
            return Ok(film);
        };

        let mut film = film;
        if film.cast.is_empty() && !attrs.actors.is_empty() {
            film = film.with_cast(dedup(&attrs.actors));
        }
        if film.directors.is_empty() && !attrs.directors.is_empty() {
            film = film.with_directors(dedup(&attrs.directors));
        }
        if film.genres.is_empty() && !attrs.genres.is_empty() {
            film = film.with_genres(dedup(&attrs.genres));
        }
        if film.poster.is_none() && attrs.poster.is_some() {
            film = film.with_poster(attrs.poster.clone());
        }
        if film.rating.is_none() {
            if let Some(rating) = attrs.rating {
                film = film.with_rating(Some(SecondaryRating {
                    rating,
                    votes: attrs.votes,
                }));
            }
        }
        Ok(film)
    }

    async fn fill_countries_and_references(
        &mut self,
        film: CanonicalFilm,
    ) -> CatalogResult<CanonicalFilm> {
        let Some(id) = film.canonical_id.clone() else {
            return Ok(film);
        };
        let needs_country = film.countries.len() != 1;
        let needs_refs = film.wikipedia.is_none() || film.filmaffinity.is_none();
        if !needs_country && !needs_refs {
            return Ok(film);
        }

        let answer: KnowledgeAnswer = self.knowledge.answer(&id).await?;
        let mut film = film;

        if needs_country {
            let answered = self.vocabulary.countries(answer.countries.iter());
            let current = self.vocabulary.countries(film.countries.iter());

            let candidates: Vec<String> = if answered.len() == 1 || current.is_empty() {
                answered.clone()
            } else {
                current
                    .iter()
                    .filter(|c| answered.contains(c))
                    .cloned()
                    .collect()
            };

            if candidates.len() == 1 {
                tracing::debug!(id = %id, country = %candidates[0], "Country settled");
                film = film.with_countries(candidates);
            } else if current.is_empty() && answered.len() > 1 {
                film = film.with_countries(answered);
            }
        }

        if film.wikipedia.is_none() && answer.wikipedia.is_some() {
            film = film.with_wikipedia(answer.wikipedia.clone());
        }
        if film.filmaffinity.is_none() && answer.filmaffinity.is_some() {
            film = film.with_filmaffinity(answer.filmaffinity);
        }
        Ok(film)
    }

    /// Earliest publication across members; each member's first sighting
    /// is persisted and can only move backward
    fn settle_publication(&mut self, film: CanonicalFilm) -> CanonicalFilm {
        let mut earliest: Option<NaiveDate> = None;

        let members: Vec<(String, Option<NaiveDate>)> = film
            .members()
            .map(|m| (m.key(), m.published))
            .collect();

        for (key, observed) in members {
            let persisted = self.publications.get(&key).copied();
            let first = [observed, persisted]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(self.today);
            if persisted != Some(first) {
                self.publications.put(key, first);
            }
            earliest = Some(earliest.map_or(first, |e| e.min(first)));
        }

        film.with_published(earliest)
    }

    fn expire(&self, film: CanonicalFilm) -> CanonicalFilm {
        match film.expires {
            Some(date) if date < self.today => film.with_expires(None),
            _ => film,
        }
    }
}
