// Tier 1: Knowledge Service Client (Wikidata SPARQL)
//
// Looks up a film item by its IMDb id (P345) and returns its countries of
// origin (P495), FilmAffinity id (P480) and Wikipedia article.
//
// The endpoint is not deterministic: consecutive identical queries can come
// back with fewer bindings. Callers go through the consensus layer, never
// this client directly.
//
// Endpoint: https://query.wikidata.org/sparql

use crate::config::HttpConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::types::CanonicalId;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "wikidata";

/// One answer of the knowledge service for a canonical id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeAnswer {
    /// Country labels as the service spells them
    pub countries: BTreeSet<String>,
    pub filmaffinity: Option<u64>,
    pub wikipedia: Option<String>,
}

/// Knowledge service queried by canonical id
#[async_trait]
pub trait KnowledgeService: Send + Sync {
    async fn query(&self, id: &CanonicalId) -> CatalogResult<KnowledgeAnswer>;
}

#[async_trait]
impl<T: KnowledgeService + ?Sized> KnowledgeService for Arc<T> {
    async fn query(&self, id: &CanonicalId) -> CatalogResult<KnowledgeAnswer> {
        (**self).query(id).await
    }
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    #[serde(default)]
    bindings: Vec<BTreeMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
}

/// Wikidata SPARQL client
pub struct WikidataClient {
    client: Client,
    endpoint: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl WikidataClient {
    pub fn new(user_agent: &str, http: &HttpConfig) -> CatalogResult<Self> {
        Self::with_endpoint(user_agent, http, "https://query.wikidata.org/sparql")
    }

    pub fn with_endpoint(user_agent: &str, http: &HttpConfig, endpoint: &str) -> CatalogResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(http.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CatalogError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(http.wikidata_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

/// SPARQL for one IMDb id
pub(crate) fn build_query(id: &CanonicalId) -> String {
    format!(
        r#"SELECT ?item ?countryLabel ?filmaffinity ?esArticle ?enArticle WHERE {{
  ?item wdt:P345 "{id}".
  OPTIONAL {{ ?item wdt:P495 ?country. }}
  OPTIONAL {{ ?item wdt:P480 ?filmaffinity. }}
  OPTIONAL {{ ?esArticle schema:about ?item ; schema:isPartOf <https://es.wikipedia.org/> . }}
  OPTIONAL {{ ?enArticle schema:about ?item ; schema:isPartOf <https://en.wikipedia.org/> . }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "en". }}
}}"#
    )
}

/// Collapse SPARQL bindings into one answer
///
/// Multi-valued cross-reference ids are ambiguous and dropped; the Spanish
/// article wins over the English one.
pub(crate) fn fold_bindings(id: &CanonicalId, bindings: &[BTreeMap<String, String>]) -> KnowledgeAnswer {
    let mut values: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for b in bindings {
        for key in ["countryLabel", "filmaffinity", "esArticle", "enArticle"] {
            if let Some(v) = b.get(key) {
                let v = v.trim();
                if !v.is_empty() {
                    values.entry(key).or_default().insert(v.to_string());
                }
            }
        }
    }

    let single = |key: &str| -> Option<String> {
        let set = values.get(key)?;
        if set.len() > 1 {
            tracing::warn!(id = %id, field = key, count = set.len(), "Ambiguous knowledge value dropped");
            return None;
        }
        set.iter().next().cloned()
    };

    KnowledgeAnswer {
        countries: values.get("countryLabel").cloned().unwrap_or_default(),
        filmaffinity: single("filmaffinity").and_then(|v| v.parse().ok()),
        wikipedia: single("esArticle").or_else(|| single("enArticle")),
    }
}

#[async_trait]
impl KnowledgeService for WikidataClient {
    async fn query(&self, id: &CanonicalId) -> CatalogResult<KnowledgeAnswer> {
        self.rate_limiter.until_ready().await;

        tracing::debug!("Querying Wikidata: id={}", id);

        let response = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/sparql-results+json")
            .query(&[("query", build_query(id))])
            .send()
            .await
            .map_err(|e| CatalogError::unavailable(SERVICE, id.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::unavailable(
                SERVICE,
                id.as_str(),
                format!("status {}", status),
            ));
        }

        let parsed: SparqlResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::unavailable(SERVICE, id.as_str(), e))?;

        let bindings: Vec<BTreeMap<String, String>> = parsed
            .results
            .bindings
            .into_iter()
            .map(|b| b.into_iter().map(|(k, v)| (k, v.value)).collect())
            .collect();

        Ok(fold_bindings(id, &bindings))
    }
}
