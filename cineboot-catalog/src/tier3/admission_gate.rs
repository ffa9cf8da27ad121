// Tier 3: Admission Gate
//
// Concept: keep episodic TV, foreign TV filler and low-rated titles out of
// the catalog.
// Synchronization: accepts a record plus its canonical attributes, returns
// Admit or the first rule that rejected it.
//
// Rules run in order; the first rejection wins:
// 1. Episodic   - series, mini-series and episodes, whatever their score
// 2. ForeignTv  - award-less one-off TV productions from abroad, score < 5
// 3. QualityFloor - score under a floor that depends on provider, genre and
//                   country; an unknown score passes

use crate::config::{AdmissionConfig, Vocabulary};
use crate::types::{CanonicalInfo, SourceRecord};
use serde::Serialize;
use std::fmt;

/// Admission rule, evaluated in list order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GateRule {
    Episodic,
    ForeignTv,
    QualityFloor,
}

impl GateRule {
    pub const ALL: [GateRule; 3] = [GateRule::Episodic, GateRule::ForeignTv, GateRule::QualityFloor];
}

impl fmt::Display for GateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Episodic => "episodic",
            Self::ForeignTv => "foreign_tv",
            Self::QualityFloor => "quality_floor",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admit,
    Reject { rule: GateRule, detail: String },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admit)
    }
}

pub struct AdmissionGate {
    config: AdmissionConfig,
    vocabulary: Vocabulary,
    rules: Vec<GateRule>,
}

impl AdmissionGate {
    pub fn new(config: AdmissionConfig, vocabulary: Vocabulary) -> Self {
        Self::with_rules(config, vocabulary, GateRule::ALL.to_vec())
    }

    pub fn with_rules(config: AdmissionConfig, vocabulary: Vocabulary, rules: Vec<GateRule>) -> Self {
        Self {
            config,
            vocabulary,
            rules,
        }
    }

    /// Decide whether a record enters the catalog
    ///
    /// Records without canonical attributes are always admitted.
    pub fn admit(&self, record: &SourceRecord, info: Option<&CanonicalInfo>) -> Admission {
        let Some(info) = info else {
            return Admission::Admit;
        };

        for rule in &self.rules {
            if let Some(detail) = self.check(*rule, record, info) {
                return Admission::Reject {
                    rule: *rule,
                    detail,
                };
            }
        }
        Admission::Admit
    }

    fn check(&self, rule: GateRule, record: &SourceRecord, info: &CanonicalInfo) -> Option<String> {
        match rule {
            GateRule::Episodic => info
                .title_type
                .as_ref()
                .filter(|t| t.is_episodic())
                .map(|t| format!("type={}", t)),
            GateRule::ForeignTv => {
                let kind = info.title_type.as_ref().filter(|t| t.is_tv_one_off())?;
                let home = &self.config.home_country;
                let foreign = !info.countries.is_empty()
                    && !info.countries.iter().any(|c| c.eq_ignore_ascii_case(home));
                let weak = info
                    .quality_score()
                    .map_or(true, |s| s < self.config.foreign_tv_min_score);
                (!info.has_awards && foreign && weak).then(|| format!("type={}", kind))
            }
            GateRule::QualityFloor => {
                let score = info.quality_score()?;
                let floor = self.floor(record, info);
                (score < floor).then(|| format!("score={:.1} floor={:.1}", score, floor))
            }
        }
    }

    /// Minimum score for a record
    pub fn floor(&self, record: &SourceRecord, info: &CanonicalInfo) -> f64 {
        let c = &self.config;
        let adjustment = c
            .provider_adjustments
            .get(&record.provider)
            .copied()
            .unwrap_or(0.0);

        let genres: Vec<String> = record
            .genres
            .iter()
            .chain(info.genres.iter())
            .map(|g| g.trim().to_lowercase())
            .collect();
        let has = |list: &[String], value: &str| list.iter().any(|l| l.to_lowercase() == value);

        let exempt = genres.iter().any(|g| has(&c.exemption_tags, g));
        let soft = genres.iter().any(|g| has(&c.soft_genres, g));
        // provider spellings are raw; canonical ones pass through unchanged
        let countries = if info.countries.is_empty() {
            self.vocabulary.countries(record.countries.iter())
        } else {
            self.vocabulary.countries(info.countries.iter())
        };
        let crowded = countries
            .iter()
            .any(|country| has(&c.overrepresented_countries, &country.to_lowercase()));

        let raise = if !exempt && (soft || crowded) {
            c.floor_raise
        } else {
            0.0
        };

        (c.base_floor + adjustment + raise).min(c.base_floor + c.floor_raise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CanonicalId, TitleType};

    fn gate() -> AdmissionGate {
        AdmissionGate::new(AdmissionConfig::default(), Vocabulary::default())
    }

    fn record(provider: &str) -> SourceRecord {
        SourceRecord {
            provider: provider.into(),
            id: "1".into(),
            title: "Film".into(),
            ..Default::default()
        }
    }

    fn info(kind: &str, rating: Option<f64>, countries: &[&str]) -> CanonicalInfo {
        let mut i = CanonicalInfo::new(CanonicalId::parse("tt0000001").unwrap());
        i.title_type = Some(TitleType::parse(kind));
        i.rating = rating;
        i.countries = countries.iter().map(|c| c.to_string()).collect();
        i
    }

    fn rejected_by(a: &Admission) -> Option<GateRule> {
        match a {
            Admission::Reject { rule, .. } => Some(*rule),
            Admission::Admit => None,
        }
    }

    #[test]
    fn test_no_info_is_admitted() {
        assert!(gate().admit(&record("rtve"), None).is_admitted());
    }

    #[test]
    fn test_series_rejected_whatever_the_score() {
        let a = gate().admit(&record("rtve"), Some(&info("tvSeries", Some(9.0), &["ESP"])));
        assert_eq!(rejected_by(&a), Some(GateRule::Episodic));
    }

    #[test]
    fn test_foreign_tv_movie_rules() {
        let g = gate();
        let r = record("rtve");

        let a = g.admit(&r, Some(&info("tvMovie", Some(4.5), &["USA"])));
        assert_eq!(rejected_by(&a), Some(GateRule::ForeignTv));

        // unknown score counts as low
        let a = g.admit(&r, Some(&info("tvMovie", None, &["USA"])));
        assert_eq!(rejected_by(&a), Some(GateRule::ForeignTv));

        // home production
        assert!(g.admit(&r, Some(&info("tvMovie", Some(4.5), &["ESP", "USA"]))).is_admitted());

        // awards rescue it
        let mut awarded = info("tvMovie", Some(4.5), &["USA"]);
        awarded.has_awards = true;
        assert!(g.admit(&r, Some(&awarded)).is_admitted());

        // good enough
        assert!(g.admit(&r, Some(&info("tvSpecial", Some(6.0), &["NOR"]))).is_admitted());
    }

    #[test]
    fn test_quality_floor_base_and_provider() {
        let g = gate();
        let low = info("movie", Some(3.9), &["NOR"]);
        let edge = info("movie", Some(4.2), &["NOR"]);

        assert_eq!(rejected_by(&g.admit(&record("rtve"), Some(&low))), Some(GateRule::QualityFloor));
        assert!(g.admit(&record("rtve"), Some(&edge)).is_admitted());
        assert_eq!(rejected_by(&g.admit(&record("efilm"), Some(&edge))), Some(GateRule::QualityFloor));
    }

    #[test]
    fn test_floor_raised_once_for_soft_genre_and_crowded_country() {
        let g = gate();
        let mut r = record("rtve");
        r.genres = vec!["Documental".into()];
        let i = info("movie", Some(4.5), &["USA"]);

        assert_eq!(g.floor(&r, &i), 5.0);
        assert_eq!(rejected_by(&g.admit(&r, Some(&i))), Some(GateRule::QualityFloor));
    }

    #[test]
    fn test_provider_country_spelling_counts_as_crowded() {
        let g = gate();
        let mut r = record("rtve");
        r.countries = vec!["Estados Unidos".into()];
        let i = info("movie", Some(4.5), &[]);

        assert_eq!(g.floor(&r, &i), 5.0);
        assert_eq!(rejected_by(&g.admit(&r, Some(&i))), Some(GateRule::QualityFloor));
    }

    #[test]
    fn test_exemption_tag_cancels_raise() {
        let g = gate();
        let mut r = record("rtve");
        r.genres = vec!["Terror".into(), "Serie B".into()];
        let i = info("movie", Some(4.5), &["NOR"]);

        assert_eq!(g.floor(&r, &i), 4.0);
        assert!(g.admit(&r, Some(&i)).is_admitted());
    }

    #[test]
    fn test_score_above_base_plus_one_always_passes_floor() {
        let g = gate();
        let mut r = record("efilm");
        r.genres = vec!["western".into()];
        let i = info("movie", Some(5.0), &["USA"]);

        assert_eq!(g.floor(&r, &i), 5.0);
        assert!(g.admit(&r, Some(&i)).is_admitted());
    }

    #[test]
    fn test_unknown_score_passes_floor() {
        assert!(gate().admit(&record("efilm"), Some(&info("movie", None, &["USA"]))).is_admitted());
    }

    #[test]
    fn test_rule_list_is_data() {
        let g = AdmissionGate::with_rules(
            AdmissionConfig::default(),
            Vocabulary::default(),
            vec![GateRule::QualityFloor],
        );
        assert!(g.admit(&record("rtve"), Some(&info("tvSeries", Some(9.0), &[]))).is_admitted());
    }
}
