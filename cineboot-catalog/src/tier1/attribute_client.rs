// Tier 1: Secondary Attribute API Client (OMDb)
//
// One GET per canonical id. No consensus: the answer is taken as is.
// Transient failures (5xx, network) are retried with a fixed budget; a
// "Request limit reached!" answer switches the client off for the rest of
// the run.
//
// API Documentation: https://www.omdbapi.com/

use crate::config::HttpConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::types::{Attributes, CanonicalId, TitleType};
use crate::utils::{retry_transient, RetryPolicy};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::{Map, Value};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const SERVICE: &str = "omdb";
const LIMIT_REACHED: &str = "Request limit reached!";

/// Source of secondary attributes keyed by canonical id
#[async_trait]
pub trait AttributeSource: Send + Sync {
    /// `Ok(None)` when the id is unknown to the source or the source is
    /// switched off; `Err` only when the retry budget ran out
    async fn get(&self, id: &CanonicalId) -> CatalogResult<Option<Attributes>>;
}

#[derive(Debug)]
enum FetchError {
    Transient(String),
    Fatal(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient(m) | Self::Fatal(m) => f.write_str(m),
        }
    }
}

/// OMDb API client
pub struct OmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
    /// Cleared once the daily quota is exhausted
    active: AtomicBool,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl OmdbClient {
    pub fn new(api_key: String, user_agent: &str, http: &HttpConfig) -> CatalogResult<Self> {
        Self::with_base_url(api_key, user_agent, http, "https://www.omdbapi.com/")
    }

    pub fn with_base_url(
        api_key: String,
        user_agent: &str,
        http: &HttpConfig,
        base_url: &str,
    ) -> CatalogResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(http.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CatalogError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(http.omdb_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key,
            retry: RetryPolicy::new(http.retries, Duration::from_millis(http.retry_delay_ms)),
            active: AtomicBool::new(true),
            rate_limiter,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    async fn fetch(&self, id: &CanonicalId) -> Result<Map<String, Value>, FetchError> {
        self.rate_limiter.until_ready().await;

        tracing::debug!("Querying OMDb API: id={}", id);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("apikey", self.api_key.as_str()), ("i", id.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("OMDb request failed: {}", e)))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(FetchError::Transient(format!("OMDb returned {}", status)));
        }

        // OMDb answers quota and lookup errors as JSON with a 401/200 status
        response
            .json::<Map<String, Value>>()
            .await
            .map_err(|e| FetchError::Fatal(format!("Failed to parse OMDb response: {}", e)))
    }
}

#[async_trait]
impl AttributeSource for OmdbClient {
    async fn get(&self, id: &CanonicalId) -> CatalogResult<Option<Attributes>> {
        if !self.is_active() {
            return Ok(None);
        }

        let js = retry_transient(
            "omdb lookup",
            self.retry,
            |e: &FetchError| matches!(e, FetchError::Transient(_)),
            || self.fetch(id),
        )
        .await
        .map_err(|e| CatalogError::unavailable(SERVICE, id.as_str(), e))?;

        if let Some(error) = js.get("Error").and_then(Value::as_str) {
            if error.trim() == LIMIT_REACHED {
                if self.active.swap(false, Ordering::Relaxed) {
                    tracing::warn!("OMDb request limit reached, disabling client for this run");
                }
            } else {
                tracing::warn!("OMDb: {} = {}", id, error);
            }
            return Ok(None);
        }

        Ok(Some(parse_attributes(&js)))
    }
}

/// Field text with OMDb's "N/A" placeholder mapped to `None`
fn text<'a>(js: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    js.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "N/A")
}

fn list(js: &Map<String, Value>, key: &str) -> Vec<String> {
    text(js, key)
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn leading_number(s: &str) -> Option<&str> {
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == ','))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    Some(&s[..end]).filter(|n| !n.is_empty())
}

pub(crate) fn parse_attributes(js: &Map<String, Value>) -> Attributes {
    Attributes {
        actors: list(js, "Actors"),
        directors: list(js, "Director"),
        genres: list(js, "Genre"),
        countries: list(js, "Country"),
        poster: text(js, "Poster").map(str::to_string),
        rating: text(js, "imdbRating")
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|r| *r >= 0.0),
        votes: text(js, "imdbVotes")
            .and_then(|s| s.replace(',', "").parse::<u64>().ok()),
        title_type: text(js, "Type").map(TitleType::parse),
        awards: text(js, "Awards").map(str::to_string),
        year: text(js, "Year")
            .and_then(|s| s.get(..4))
            .and_then(|s| s.parse().ok()),
        runtime: text(js, "Runtime")
            .and_then(leading_number)
            .and_then(|s| s.parse().ok()),
    }
}
