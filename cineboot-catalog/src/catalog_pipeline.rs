//! Catalog run orchestration
//!
//! One run takes every provider record through four sequential passes:
//!
//! 1. **Resolve** - provider id, else id-mapping cache, else the resolver
//! 2. **Admit** - canonical attributes looked up, then the admission gate
//! 3. **Merge** - one film per canonical id
//! 4. **Enrich** - attribute and knowledge backfill, publication dates
//!
//! A record that breaks the structural contract aborts the run before any
//! pass starts. A record or film whose external lookups exhaust their budget
//! is dropped and reported; the run goes on. The persisted caches are only
//! written when the whole run succeeded.

use crate::config::{CatalogConfig, Vocabulary};
use crate::error::{CatalogError, CatalogResult};
use crate::tier1::{AttributeSource, KnowledgeService, KvStore, MetadataStore, RecordFeed};
use crate::tier2::IdentifierResolver;
use crate::tier3::{Admission, AdmissionGate, EnrichmentPipeline, MergeEngine};
use crate::types::{
    AdmittedRecord, CanonicalId, CanonicalInfo, CatalogReport, IdOrigin, IdSet, ResolvedRecord,
    SkipReason, SkippedRecord, SourceRecord,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// External sources of a run
#[derive(Clone)]
pub struct CatalogSources {
    pub store: Arc<dyn MetadataStore>,
    pub attributes: Arc<dyn AttributeSource>,
    pub knowledge: Arc<dyn KnowledgeService>,
}

/// Caches that outlive a run
pub struct CatalogCaches {
    /// `provider:id` → canonical id
    pub ids: Box<dyn KvStore<CanonicalId>>,
    /// `provider:id` → first publication date
    pub publications: Box<dyn KvStore<NaiveDate>>,
}

pub struct CatalogPipeline {
    run_id: Uuid,
    store: Arc<dyn MetadataStore>,
    vocabulary: Vocabulary,
    resolver: IdentifierResolver,
    gate: AdmissionGate,
    merger: MergeEngine,
    enrichment: EnrichmentPipeline,
    ids: Box<dyn KvStore<CanonicalId>>,
}

impl CatalogPipeline {
    /// `today` is the processing date used for first sightings and expiry
    pub fn new(
        config: CatalogConfig,
        sources: CatalogSources,
        caches: CatalogCaches,
        today: NaiveDate,
    ) -> Self {
        let CatalogConfig {
            resolver,
            consensus,
            admission,
            merge,
            vocabulary,
            ..
        } = config;

        Self {
            run_id: Uuid::new_v4(),
            store: sources.store.clone(),
            vocabulary: vocabulary.clone(),
            resolver: IdentifierResolver::new(sources.store, resolver),
            gate: AdmissionGate::new(admission, vocabulary.clone()),
            merger: MergeEngine::new(merge),
            enrichment: EnrichmentPipeline::new(
                sources.attributes,
                sources.knowledge,
                consensus,
                vocabulary,
                caches.publications,
                today,
            ),
            ids: caches.ids,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Read every feed, then run the passes over the combined records
    pub async fn run_feeds(&mut self, feeds: &[Box<dyn RecordFeed>]) -> CatalogResult<CatalogReport> {
        let mut records = Vec::new();
        for feed in feeds {
            records.extend(feed.records().await?);
        }
        self.run(records).await
    }

    pub async fn run(&mut self, records: Vec<SourceRecord>) -> CatalogResult<CatalogReport> {
        let run_id = self.run_id;
        tracing::info!(%run_id, records = records.len(), "Starting catalog run");

        for r in &records {
            r.validate()
                .map_err(|problem| CatalogError::MalformedUpstreamRecord {
                    provider: r.provider.clone(),
                    id: r.id.clone(),
                    problem,
                })?;
        }

        let mut skipped = Vec::new();

        // Pass 1: resolve
        let resolved = self.resolve_all(records).await?;
        let unresolved = resolved
            .iter()
            .filter(|r| r.origin == IdOrigin::Unresolved)
            .count();
        tracing::info!(
            %run_id,
            resolved = resolved.len() - unresolved,
            unresolved,
            "Resolution pass complete"
        );

        // Pass 2: admit
        let infos = self.lookup_infos(&resolved).await?;
        let mut admitted = Vec::new();
        for r in resolved {
            let info = match &r.canonical_id {
                Some(id) => match infos.get(id) {
                    Some(Ok(info)) => Some(info.clone()),
                    Some(Err(reason)) => {
                        tracing::warn!(%run_id, key = %r.record.key(), %reason, "Dropping record");
                        skipped.push(SkippedRecord {
                            key: r.record.key(),
                            title: r.record.title.clone(),
                            reason: SkipReason::ServiceUnavailable(reason.clone()),
                        });
                        continue;
                    }
                    None => None,
                },
                None => None,
            };

            match self.gate.admit(&r.record, info.as_ref()) {
                Admission::Admit => admitted.push(AdmittedRecord {
                    record: r.record,
                    canonical_id: r.canonical_id,
                    info,
                }),
                Admission::Reject { rule, detail } => {
                    tracing::info!(
                        %run_id,
                        key = %r.record.key(),
                        title = %r.record.title,
                        %rule,
                        %detail,
                        "Record rejected"
                    );
                    skipped.push(SkippedRecord {
                        key: r.record.key(),
                        title: r.record.title,
                        reason: SkipReason::Rejected {
                            rule: rule.to_string(),
                            detail,
                        },
                    });
                }
            }
        }
        tracing::info!(%run_id, admitted = admitted.len(), skipped = skipped.len(), "Admission pass complete");

        // Pass 3: merge
        let merged = self.merger.merge(admitted);
        tracing::info!(%run_id, films = merged.len(), "Merge pass complete");

        // Pass 4: enrich
        let mut films = Vec::with_capacity(merged.len());
        for film in merged {
            let keys: Vec<(String, String)> = film
                .members()
                .map(|m| (m.key(), m.title.clone()))
                .collect();
            match self.enrichment.enrich(film).await {
                Ok(film) => films.push(film),
                Err(e) if e.is_record_scoped() => {
                    tracing::warn!(%run_id, error = %e, members = keys.len(), "Dropping film");
                    for (key, title) in keys {
                        skipped.push(SkippedRecord {
                            key,
                            title,
                            reason: SkipReason::ServiceUnavailable(e.to_string()),
                        });
                    }
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(%run_id, films = films.len(), "Enrichment pass complete");

        self.ids.flush()?;
        self.enrichment.flush()?;

        Ok(CatalogReport {
            run_id,
            films,
            skipped,
            unresolved,
        })
    }

    async fn resolve_all(&mut self, records: Vec<SourceRecord>) -> CatalogResult<Vec<ResolvedRecord>> {
        let mut resolved = Vec::with_capacity(records.len());

        for record in records {
            let key = record.key();
            let (canonical_id, origin) = if let Some(id) = record.canonical_id.clone() {
                (Some(id), IdOrigin::Provider)
            } else if let Some(id) = self.ids.get(&key) {
                (Some(id.clone()), IdOrigin::Cache)
            } else {
                match self
                    .resolver
                    .resolve(&record.title, record.year, &record.directors, record.duration)
                    .await?
                {
                    Some(id) => {
                        self.ids.put(key, id.clone());
                        (Some(id), IdOrigin::Resolver)
                    }
                    None => (None, IdOrigin::Unresolved),
                }
            };

            resolved.push(ResolvedRecord {
                record,
                canonical_id,
                origin,
            });
        }

        Ok(resolved)
    }

    /// Canonical attributes per id: the store first, the attribute API for
    /// ids the store lacks or that have no countries
    async fn lookup_infos(
        &mut self,
        resolved: &[ResolvedRecord],
    ) -> CatalogResult<BTreeMap<CanonicalId, Result<CanonicalInfo, String>>> {
        let ids: IdSet = resolved
            .iter()
            .filter_map(|r| r.canonical_id.clone())
            .collect();
        let mut stored = self.store.lookup(&ids).await?;

        let mut infos = BTreeMap::new();
        for id in ids {
            let known = stored.remove(&id);
            let needs_fallback = known.as_ref().map_or(true, |i| i.countries.is_empty());

            let info = if needs_fallback {
                match self.enrichment.attributes_for(&id).await {
                    Ok(attrs) => merge_fallback(&id, known, attrs.map(|a| a.to_info(id.clone()))),
                    Err(e) if e.is_record_scoped() => match known {
                        // store data is enough to judge the record
                        Some(info) => Some(info),
                        None => {
                            infos.insert(id, Err(e.to_string()));
                            continue;
                        }
                    },
                    Err(e) => return Err(e),
                }
            } else {
                known
            };

            if let Some(mut info) = info {
                info.countries = self.vocabulary.countries(info.countries.iter());
                infos.insert(id, Ok(info));
            }
        }

        Ok(infos)
    }
}

/// Store data wins; the fallback only fills countries and anything absent
fn merge_fallback(
    id: &CanonicalId,
    known: Option<CanonicalInfo>,
    fallback: Option<CanonicalInfo>,
) -> Option<CanonicalInfo> {
    match (known, fallback) {
        (Some(mut k), Some(f)) => {
            if k.countries.is_empty() {
                k.countries = f.countries;
            }
            if k.genres.is_empty() {
                k.genres = f.genres;
            }
            k.title_type = k.title_type.or(f.title_type);
            k.rating = k.rating.or(f.rating);
            k.votes = k.votes.or(f.votes);
            k.poster = k.poster.or(f.poster);
            k.has_awards |= f.has_awards;
            Some(k)
        }
        (Some(k), None) => Some(k),
        (None, Some(f)) => {
            tracing::debug!(id = %id, "Canonical info from attribute API");
            Some(f)
        }
        (None, None) => None,
    }
}
