// Tier 3: Merge Engine
//
// Concept: one film per canonical id, whatever the number of providers
// listing it.
// Synchronization: accepts admitted records, returns CanonicalFilm values in
// a deterministic order.
//
// Election (first difference decides):
// 1. preferred provider
// 2. home-language audio
// 3. home-language subtitles
// 4. more audio tracks
// 5. more subtitle tracks
// 6. title, ascending
// 7. provider, then provider id, ascending
//
// Output: resolved groups by canonical id, then unresolved singletons by
// (provider, id).

use crate::config::MergeConfig;
use crate::types::{AdmittedRecord, CanonicalFilm, CanonicalId, CanonicalInfo, SourceRecord};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub struct MergeEngine {
    config: MergeConfig,
}

impl MergeEngine {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// Total order used by the election; `Less` means `a` is preferred
    pub fn election_order(&self, a: &SourceRecord, b: &SourceRecord) -> Ordering {
        let preferred = |r: &SourceRecord| r.provider == self.config.preferred_provider;
        let lang = self.config.home_language.as_str();

        preferred(b)
            .cmp(&preferred(a))
            .then_with(|| b.has_audio(lang).cmp(&a.has_audio(lang)))
            .then_with(|| b.has_subtitles(lang).cmp(&a.has_subtitles(lang)))
            .then_with(|| b.audio.len().cmp(&a.audio.len()))
            .then_with(|| b.subtitles.len().cmp(&a.subtitles.len()))
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.provider.cmp(&b.provider))
            .then_with(|| a.id.cmp(&b.id))
    }

    pub fn merge(&self, admitted: Vec<AdmittedRecord>) -> Vec<CanonicalFilm> {
        let mut groups: BTreeMap<CanonicalId, (Vec<SourceRecord>, Option<CanonicalInfo>)> =
            BTreeMap::new();
        let mut singletons: Vec<AdmittedRecord> = Vec::new();

        for a in admitted {
            match a.canonical_id {
                Some(id) => {
                    let entry = groups.entry(id).or_insert_with(|| (Vec::new(), None));
                    entry.0.push(a.record);
                    if entry.1.is_none() {
                        entry.1 = a.info;
                    }
                }
                None => singletons.push(a),
            }
        }

        let mut films = Vec::with_capacity(groups.len() + singletons.len());

        for (id, (mut members, info)) in groups {
            members.sort_by(|a, b| self.election_order(a, b));
            let mut ranked = members.into_iter();
            let Some(primary) = ranked.next() else {
                continue;
            };
            let alternates: Vec<SourceRecord> = ranked.collect();
            tracing::trace!(
                id = %id,
                primary = %primary.key(),
                alternates = alternates.len(),
                "Merged group"
            );
            films.push(CanonicalFilm::new(primary, alternates, Some(id), info));
        }

        singletons.sort_by(|a, b| {
            a.record
                .provider
                .cmp(&b.record.provider)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        for s in singletons {
            films.push(CanonicalFilm::new(s.record, Vec::new(), None, s.info));
        }

        films
    }
}
