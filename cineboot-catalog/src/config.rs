//! Catalog configuration
//!
//! Every heuristic constant of the catalog run lives here with its default.
//! The values are read from the `[catalog]` table of the bootstrap config
//! file; any key left out keeps its default.

use cineboot_common::config::load_toml_section;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::CatalogResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub resolver: ResolverConfig,
    pub consensus: ConsensusConfig,
    pub admission: AdmissionConfig,
    pub merge: MergeConfig,
    pub vocabulary: Vocabulary,
    pub http: HttpConfig,
}

impl CatalogConfig {
    /// Load the `[catalog]` table, falling back to defaults when absent
    pub fn load(path: &Path) -> CatalogResult<Self> {
        Ok(load_toml_section(path, "catalog")?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// How far from the stated year the resolver searches (year ± gap)
    pub year_gap: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { year_gap: 1 }
    }
}

/// Thresholds and pacing of the consensus sampler
///
/// A value is accepted once its count strictly exceeds the active threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Threshold while the best answer is empty or the answers keep flipping
    pub contested_threshold: u32,
    /// Threshold once a non-empty answer repeats back to back
    pub settled_threshold: u32,
    pub default_threshold: u32,
    pub max_samples: u32,
    pub base_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            contested_threshold: 3,
            settled_threshold: 2,
            default_threshold: 3,
            max_samples: 8,
            base_delay_ms: 1000,
            settle_delay_ms: 2000,
            max_delay_ms: 10_000,
        }
    }
}

impl ConsensusConfig {
    /// Same thresholds with no sleeping between samples
    pub fn without_delays(self) -> Self {
        Self {
            base_delay_ms: 0,
            settle_delay_ms: 0,
            max_delay_ms: 0,
            ..self
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Alpha-3 code of the catalog's home country
    pub home_country: String,
    /// Score under which a foreign one-off TV production is rejected
    pub foreign_tv_min_score: f64,
    pub base_floor: f64,
    /// Per-provider floor adjustment
    pub provider_adjustments: BTreeMap<String, f64>,
    /// Added once to the floor when a soft genre or crowded country matches
    pub floor_raise: f64,
    pub soft_genres: Vec<String>,
    pub overrepresented_countries: Vec<String>,
    /// Genre hints that cancel the floor raise
    pub exemption_tags: Vec<String>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        let strings = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            home_country: "ESP".to_string(),
            foreign_tv_min_score: 5.0,
            base_floor: 4.0,
            provider_adjustments: BTreeMap::from([("efilm".to_string(), 0.5)]),
            floor_raise: 1.0,
            soft_genres: strings(&[
                "documentary",
                "documental",
                "western",
                "biography",
                "biografía",
                "romance",
                "romántico",
                "theater",
                "teatro",
                "horror",
                "terror",
                "animation",
                "animación",
            ]),
            overrepresented_countries: strings(&["USA", "GBR", "FRA", "ITA", "DEU"]),
            exemption_tags: strings(&["película de culto", "cult", "serie b", "b-movie"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Provider whose record is elected primary whenever present
    pub preferred_provider: String,
    /// Audio/subtitle language tag preferred by the election
    pub home_language: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            preferred_provider: "rtve".to_string(),
            home_language: "es".to_string(),
        }
    }
}

/// Static vocabulary tables
///
/// Maps raw country names (as knowledge services and providers spell them)
/// to alpha-3 codes. Keys are matched case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    pub countries: BTreeMap<String, String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let pairs = [
            ("spain", "ESP"),
            ("españa", "ESP"),
            ("united states", "USA"),
            ("united states of america", "USA"),
            ("estados unidos", "USA"),
            ("united kingdom", "GBR"),
            ("reino unido", "GBR"),
            ("france", "FRA"),
            ("francia", "FRA"),
            ("italy", "ITA"),
            ("italia", "ITA"),
            ("germany", "DEU"),
            ("west germany", "DEU"),
            ("alemania", "DEU"),
            ("mexico", "MEX"),
            ("méxico", "MEX"),
            ("argentina", "ARG"),
            ("portugal", "PRT"),
            ("japan", "JPN"),
            ("japón", "JPN"),
        ];
        Self {
            countries: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Vocabulary {
    /// Map a raw country string to its code
    ///
    /// Values that already look like alpha-3 codes pass through; unknown names
    /// are kept verbatim so no information is dropped.
    pub fn country(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.len() == 3 && raw.chars().all(|c| c.is_ascii_uppercase()) {
            return raw.to_string();
        }
        self.countries
            .get(&raw.to_lowercase())
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }

    /// Normalize a list of countries, deduplicated in first-seen order
    pub fn countries<'a>(&self, raw: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for c in raw {
            let code = self.country(c);
            if !code.is_empty() && !out.contains(&code) {
                out.push(code);
            }
        }
        out
    }
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub omdb_per_second: u32,
    pub wikidata_per_second: u32,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            omdb_per_second: 5,
            wikidata_per_second: 2,
            timeout_secs: 15,
            retries: 3,
            retry_delay_ms: 2000,
        }
    }
}
