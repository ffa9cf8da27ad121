// Shared Types and Data Contracts
//
// Explicit contracts between the three tiers:
// - Tier 1 hands out SourceRecord and CanonicalInfo
// - Tier 2 attaches a CanonicalId to each record
// - Tier 3 admits, merges and enriches into CanonicalFilm

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// IMDb-style title identifier (`tt` followed by digits)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanonicalId(String);

impl CanonicalId {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let digits = raw.strip_prefix("tt")?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CanonicalId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("not a canonical id: {:?}", value))
    }
}

impl From<CanonicalId> for String {
    fn from(id: CanonicalId) -> Self {
        id.0
    }
}

/// Ordered set of canonical ids; ordering keeps every pass deterministic
pub type IdSet = BTreeSet<CanonicalId>;

// ============================================================================
// Tier 1 Outputs: Provider Records
// ============================================================================

/// One scraped item, as handed over by a provider feed
///
/// Every field defaults so that a structurally broken record still
/// deserializes and can be reported by [`SourceRecord::validate`] instead of
/// failing somewhere inside serde.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceRecord {
    pub provider: String,
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    /// Minutes
    pub duration: Option<u32>,
    pub directors: Vec<String>,
    pub cast: Vec<String>,
    pub audio: Vec<String>,
    pub subtitles: Vec<String>,
    pub genres: Vec<String>,
    pub countries: Vec<String>,
    #[serde(deserialize_with = "lenient_id")]
    pub canonical_id: Option<CanonicalId>,
    pub url: Option<String>,
    pub poster: Option<String>,
    #[serde(deserialize_with = "lenient_date")]
    pub published: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_date")]
    pub expires: Option<NaiveDate>,
}

/// Providers publish ids as they scraped them; anything that is not a
/// canonical id is treated as absent
fn lenient_id<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<CanonicalId>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().and_then(CanonicalId::parse))
}

fn lenient_date<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().and_then(cineboot_common::time::parse_date))
}

impl SourceRecord {
    /// Key used by the persisted caches: `provider:id`
    pub fn key(&self) -> String {
        format!("{}:{}", self.provider, self.id)
    }

    /// Structural contract every record must satisfy
    pub fn validate(&self) -> Result<(), String> {
        if self.provider.trim().is_empty() {
            return Err("missing provider tag".to_string());
        }
        if self.id.trim().is_empty() {
            return Err("missing provider id".to_string());
        }
        if self.title.trim().is_empty() {
            return Err("missing title".to_string());
        }
        Ok(())
    }

    pub fn has_audio(&self, lang: &str) -> bool {
        self.audio.iter().any(|a| a.eq_ignore_ascii_case(lang))
    }

    pub fn has_subtitles(&self, lang: &str) -> bool {
        self.subtitles.iter().any(|s| s.eq_ignore_ascii_case(lang))
    }
}

// ============================================================================
// Canonical Attributes
// ============================================================================

/// Classification of a title in the metadata store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TitleType {
    Movie,
    Short,
    Video,
    TvMovie,
    TvSpecial,
    TvShort,
    TvPilot,
    TvSeries,
    TvMiniSeries,
    TvEpisode,
    Other(String),
}

impl TitleType {
    /// Accepts IMDb dataset names (`tvMiniSeries`) and OMDb names (`series`)
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "movie" => Self::Movie,
            "short" => Self::Short,
            "video" => Self::Video,
            "tvmovie" => Self::TvMovie,
            "tvspecial" => Self::TvSpecial,
            "tvshort" => Self::TvShort,
            "tvpilot" => Self::TvPilot,
            "tvseries" | "series" => Self::TvSeries,
            "tvminiseries" => Self::TvMiniSeries,
            "tvepisode" | "episode" => Self::TvEpisode,
            other => Self::Other(other.to_string()),
        }
    }

    /// Series, mini-series and episodes
    pub fn is_episodic(&self) -> bool {
        matches!(self, Self::TvSeries | Self::TvMiniSeries | Self::TvEpisode)
    }

    /// One-off television productions
    pub fn is_tv_one_off(&self) -> bool {
        matches!(
            self,
            Self::TvMovie | Self::TvSpecial | Self::TvShort | Self::TvPilot
        )
    }
}

impl fmt::Display for TitleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Movie => "movie",
            Self::Short => "short",
            Self::Video => "video",
            Self::TvMovie => "tvMovie",
            Self::TvSpecial => "tvSpecial",
            Self::TvShort => "tvShort",
            Self::TvPilot => "tvPilot",
            Self::TvSeries => "tvSeries",
            Self::TvMiniSeries => "tvMiniSeries",
            Self::TvEpisode => "tvEpisode",
            Self::Other(s) => s.as_str(),
        };
        f.write_str(s)
    }
}

/// Secondary attributes of a canonical id, re-fetched every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalInfo {
    pub id: CanonicalId,
    pub title_type: Option<TitleType>,
    pub has_awards: bool,
    pub countries: Vec<String>,
    pub genres: Vec<String>,
    pub rating: Option<f64>,
    pub votes: Option<u64>,
    pub poster: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<u32>,
}

impl CanonicalInfo {
    pub fn new(id: CanonicalId) -> Self {
        Self {
            id,
            title_type: None,
            has_awards: false,
            countries: Vec::new(),
            genres: Vec::new(),
            rating: None,
            votes: None,
            poster: None,
            year: None,
            runtime: None,
        }
    }

    /// Quality score on a 0-10 scale
    pub fn quality_score(&self) -> Option<f64> {
        self.rating.filter(|r| (0.0..=10.0).contains(r))
    }
}

/// Attributes returned by the secondary attribute API for one id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    pub actors: Vec<String>,
    pub directors: Vec<String>,
    pub genres: Vec<String>,
    pub countries: Vec<String>,
    pub poster: Option<String>,
    pub rating: Option<f64>,
    pub votes: Option<u64>,
    pub title_type: Option<TitleType>,
    pub awards: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<u32>,
}

impl Attributes {
    /// Canonical info for ids missing from the metadata store
    pub fn to_info(&self, id: CanonicalId) -> CanonicalInfo {
        CanonicalInfo {
            id,
            title_type: self.title_type.clone(),
            has_awards: self.awards.is_some(),
            countries: self.countries.clone(),
            genres: self.genres.clone(),
            rating: self.rating,
            votes: self.votes,
            poster: self.poster.clone(),
            year: self.year,
            runtime: self.runtime,
        }
    }
}

// ============================================================================
// Tier 2 Outputs: Resolution
// ============================================================================

/// Where a record's canonical id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IdOrigin {
    /// The provider published it
    Provider,
    /// Persisted mapping from a previous run
    Cache,
    /// Resolved against the metadata store this run
    Resolver,
    Unresolved,
}

/// A record after the resolution pass
#[derive(Debug, Clone)]
pub struct ResolvedRecord {
    pub record: SourceRecord,
    pub canonical_id: Option<CanonicalId>,
    pub origin: IdOrigin,
}

/// A record that passed the admission gate, with its canonical attributes
#[derive(Debug, Clone)]
pub struct AdmittedRecord {
    pub record: SourceRecord,
    pub canonical_id: Option<CanonicalId>,
    pub info: Option<CanonicalInfo>,
}

// ============================================================================
// Tier 3 Outputs: Catalog
// ============================================================================

/// Rating from the secondary attribute API
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecondaryRating {
    pub rating: f64,
    pub votes: Option<u64>,
}

/// The merged, user-facing film
///
/// Built once by the merge engine, then only replaced through the consuming
/// `with_*` constructors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalFilm {
    pub primary: SourceRecord,
    pub alternates: Vec<SourceRecord>,
    pub canonical_id: Option<CanonicalId>,
    pub info: Option<CanonicalInfo>,
    pub cast: Vec<String>,
    pub directors: Vec<String>,
    pub genres: Vec<String>,
    pub countries: Vec<String>,
    pub rating: Option<SecondaryRating>,
    pub poster: Option<String>,
    pub wikipedia: Option<String>,
    pub filmaffinity: Option<u64>,
    pub published: Option<NaiveDate>,
    pub expires: Option<NaiveDate>,
}

impl CanonicalFilm {
    /// Seed a film from its elected primary; canonical attributes fill what the
    /// primary record lacks
    pub fn new(
        primary: SourceRecord,
        alternates: Vec<SourceRecord>,
        canonical_id: Option<CanonicalId>,
        info: Option<CanonicalInfo>,
    ) -> Self {
        let countries = match &info {
            Some(i) if !i.countries.is_empty() => i.countries.clone(),
            _ => dedup(&primary.countries),
        };
        let poster = primary
            .poster
            .clone()
            .or_else(|| info.as_ref().and_then(|i| i.poster.clone()));
        let published = std::iter::once(&primary)
            .chain(alternates.iter())
            .filter_map(|r| r.published)
            .min();

        Self {
            cast: dedup(&primary.cast),
            directors: dedup(&primary.directors),
            genres: dedup(&primary.genres),
            countries,
            rating: None,
            poster,
            wikipedia: None,
            filmaffinity: None,
            published,
            expires: primary.expires,
            primary,
            alternates,
            canonical_id,
            info,
        }
    }

    /// Primary first, then alternates in election order
    pub fn members(&self) -> impl Iterator<Item = &SourceRecord> {
        std::iter::once(&self.primary).chain(self.alternates.iter())
    }

    pub fn member_count(&self) -> usize {
        1 + self.alternates.len()
    }

    pub fn with_cast(self, cast: Vec<String>) -> Self {
        Self { cast, ..self }
    }

    pub fn with_directors(self, directors: Vec<String>) -> Self {
        Self { directors, ..self }
    }

    pub fn with_genres(self, genres: Vec<String>) -> Self {
        Self { genres, ..self }
    }

    pub fn with_countries(self, countries: Vec<String>) -> Self {
        Self { countries, ..self }
    }

    pub fn with_rating(self, rating: Option<SecondaryRating>) -> Self {
        Self { rating, ..self }
    }

    pub fn with_poster(self, poster: Option<String>) -> Self {
        Self { poster, ..self }
    }

    pub fn with_wikipedia(self, wikipedia: Option<String>) -> Self {
        Self { wikipedia, ..self }
    }

    pub fn with_filmaffinity(self, filmaffinity: Option<u64>) -> Self {
        Self { filmaffinity, ..self }
    }

    pub fn with_published(self, published: Option<NaiveDate>) -> Self {
        Self { published, ..self }
    }

    pub fn with_expires(self, expires: Option<NaiveDate>) -> Self {
        Self { expires, ..self }
    }
}

/// Why a record did not make it into the catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SkipReason {
    Rejected { rule: String, detail: String },
    ServiceUnavailable(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub key: String,
    pub title: String,
    pub reason: SkipReason,
}

/// Result of one catalog run
#[derive(Debug, Clone, Serialize)]
pub struct CatalogReport {
    pub run_id: Uuid,
    pub films: Vec<CanonicalFilm>,
    pub skipped: Vec<SkippedRecord>,
    pub unresolved: usize,
}

/// Trimmed, order-preserving dedup of free-text values
pub fn dedup(values: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && seen.insert(v.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_id_parse() {
        assert_eq!(CanonicalId::parse(" tt0034583 ").unwrap().as_str(), "tt0034583");
        assert!(CanonicalId::parse("nm0000001").is_none());
        assert!(CanonicalId::parse("tt").is_none());
        assert!(CanonicalId::parse("tt12x").is_none());
    }

    #[test]
    fn test_canonical_id_serde_rejects_garbage() {
        let ok: CanonicalId = serde_json::from_str("\"tt0034583\"").unwrap();
        assert_eq!(ok.as_str(), "tt0034583");
        assert!(serde_json::from_str::<CanonicalId>("\"casablanca\"").is_err());
    }

    #[test]
    fn test_record_accepts_loose_dates_and_ids() {
        let r: SourceRecord = serde_json::from_str(
            r#"{"provider":"rtve","id":"1","title":"X","canonical_id":"n/a",
                "published":"01-03-2024 10:00:00","expires":"2024-04-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(r.canonical_id.is_none());
        assert_eq!(r.published, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(r.expires, NaiveDate::from_ymd_opt(2024, 4, 1));
    }

    #[test]
    fn test_title_type_parse() {
        assert_eq!(TitleType::parse("tvSeries"), TitleType::TvSeries);
        assert_eq!(TitleType::parse("series"), TitleType::TvSeries);
        assert_eq!(TitleType::parse("episode"), TitleType::TvEpisode);
        assert!(TitleType::parse("tvMiniSeries").is_episodic());
        assert!(TitleType::parse("tvPilot").is_tv_one_off());
        assert!(!TitleType::parse("movie").is_episodic());
    }

    #[test]
    fn test_record_validate() {
        let mut r = SourceRecord {
            provider: "rtve".into(),
            id: "1".into(),
            title: "Casablanca".into(),
            ..Default::default()
        };
        assert!(r.validate().is_ok());
        r.title = "  ".into();
        assert_eq!(r.validate().unwrap_err(), "missing title");
    }

    #[test]
    fn test_record_deserializes_with_missing_fields() {
        let r: SourceRecord = serde_json::from_str(r#"{"provider":"efilm","id":"9"}"#).unwrap();
        assert!(r.title.is_empty());
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_film_seeds_from_primary_and_info() {
        let id = CanonicalId::parse("tt0034583").unwrap();
        let mut info = CanonicalInfo::new(id.clone());
        info.countries = vec!["USA".into()];
        info.poster = Some("info.jpg".into());

        let primary = SourceRecord {
            provider: "rtve".into(),
            id: "1".into(),
            title: "Casablanca".into(),
            countries: vec!["ESP".into()],
            published: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..Default::default()
        };
        let alternate = SourceRecord {
            provider: "efilm".into(),
            id: "2".into(),
            title: "Casablanca".into(),
            published: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };

        let film = CanonicalFilm::new(primary, vec![alternate], Some(id), Some(info));
        assert_eq!(film.countries, vec!["USA".to_string()]);
        assert_eq!(film.poster.as_deref(), Some("info.jpg"));
        assert_eq!(film.published, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(film.member_count(), 2);
    }

    #[test]
    fn test_dedup_trims_and_keeps_order() {
        let v = vec![" b".to_string(), "a".into(), "b ".into(), "".into()];
        assert_eq!(dedup(&v), vec!["b".to_string(), "a".to_string()]);
    }
}
