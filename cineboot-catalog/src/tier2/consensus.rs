// Tier 2: Consensus Query Layer
//
// Concept: extract a stable answer from a service whose answers differ
// between identical calls (the SPARQL endpoint sometimes drops bindings).
// Synchronization: wraps any side-effect-free async query, returns one value.
//
// Algorithm:
// 1. Sample the query and tally each distinct answer, the empty one included
// 2. After each sample pick the acceptance threshold:
//    - contested: best answer is empty, or the latest sample disagrees
//      with the one before it
//    - settled: best answer is non-empty and the latest answer has repeated
//    - default: anything else
// 3. Stop once some answer's count strictly exceeds the threshold, or the
//    sample budget is spent
// 4. Winner: non-empty > richer > more frequent > seen first

use crate::config::ConsensusConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::tier1::{KnowledgeAnswer, KnowledgeService};
use crate::types::CanonicalId;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::time::Duration;

/// Answer type the consensus layer can tally and rank
pub trait ConsensusValue: Clone + PartialEq + Send + Sync {
    /// True for "no information"
    fn is_empty_value(&self) -> bool;

    /// Number of populated parts; richer answers win ties on emptiness
    fn richness(&self) -> usize;
}

impl ConsensusValue for String {
    fn is_empty_value(&self) -> bool {
        self.trim().is_empty()
    }

    fn richness(&self) -> usize {
        usize::from(!self.is_empty_value())
    }
}

impl<T: Clone + PartialEq + Send + Sync> ConsensusValue for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }

    fn richness(&self) -> usize {
        self.len()
    }
}

impl<T: Clone + Ord + Send + Sync> ConsensusValue for BTreeSet<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }

    fn richness(&self) -> usize {
        self.len()
    }
}

impl<T: ConsensusValue> ConsensusValue for Option<T> {
    fn is_empty_value(&self) -> bool {
        self.as_ref().map_or(true, ConsensusValue::is_empty_value)
    }

    fn richness(&self) -> usize {
        self.as_ref().map_or(0, ConsensusValue::richness)
    }
}

impl ConsensusValue for KnowledgeAnswer {
    fn is_empty_value(&self) -> bool {
        self.richness() == 0
    }

    fn richness(&self) -> usize {
        self.countries.len()
            + usize::from(self.filmaffinity.is_some())
            + usize::from(self.wikipedia.is_some())
    }
}

#[derive(Debug, Clone)]
struct Tally<T> {
    value: T,
    count: u32,
    /// Sample index of the first observation
    first_seen: u32,
}

/// Per-key sampling state
///
/// Lives only while one key is being stabilized.
#[derive(Debug, Clone)]
pub struct ConsensusObservation<T> {
    tallies: Vec<Tally<T>>,
    last: Option<usize>,
    /// Whether the latest sample differs from the one before it
    flipped: bool,
    streak: u32,
    samples: u32,
    failures: u32,
}

impl<T> Default for ConsensusObservation<T> {
    fn default() -> Self {
        Self {
            tallies: Vec::new(),
            last: None,
            flipped: false,
            streak: 0,
            samples: 0,
            failures: 0,
        }
    }
}

impl<T: ConsensusValue> ConsensusObservation<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally one successful answer
    pub fn observe(&mut self, value: T) {
        let index = match self.tallies.iter().position(|t| t.value == value) {
            Some(i) => {
                self.tallies[i].count += 1;
                i
            }
            None => {
                self.tallies.push(Tally {
                    value,
                    count: 1,
                    first_seen: self.samples,
                });
                self.tallies.len() - 1
            }
        };

        if self.last == Some(index) {
            self.streak += 1;
            self.flipped = false;
        } else {
            self.flipped = self.last.is_some();
            self.streak = 1;
        }
        self.last = Some(index);
        self.samples += 1;
    }

    pub fn fail(&mut self) {
        self.samples += 1;
        self.failures += 1;
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Count of an answer, zero when never seen
    pub fn count(&self, value: &T) -> u32 {
        self.tallies
            .iter()
            .find(|t| &t.value == value)
            .map_or(0, |t| t.count)
    }

    fn latest(&self) -> Option<&Tally<T>> {
        self.last.map(|i| &self.tallies[i])
    }

    fn best(&self) -> Option<&Tally<T>> {
        self.tallies.iter().min_by(|a, b| {
            a.value
                .is_empty_value()
                .cmp(&b.value.is_empty_value())
                .then_with(|| b.value.richness().cmp(&a.value.richness()))
                .then_with(|| b.count.cmp(&a.count))
                .then_with(|| a.first_seen.cmp(&b.first_seen))
        })
    }

    /// Best answer so far
    pub fn winner(&self) -> Option<&T> {
        self.best().map(|t| &t.value)
    }

    /// Acceptance threshold for the current state
    pub fn threshold(&self, config: &ConsensusConfig) -> u32 {
        let best_empty = self.best().map_or(true, |t| t.value.is_empty_value());
        let latest_empty = self.latest().map_or(true, |t| t.value.is_empty_value());

        if best_empty || self.flipped {
            config.contested_threshold
        } else if !latest_empty && self.streak >= 2 {
            config.settled_threshold
        } else {
            config.default_threshold
        }
    }

    /// Some answer has strictly exceeded the active threshold
    pub fn is_settled(&self, config: &ConsensusConfig) -> bool {
        let threshold = self.threshold(config);
        self.tallies.iter().any(|t| t.count > threshold)
    }

    /// Pause before the next sample
    pub fn next_delay(&self, config: &ConsensusConfig) -> Duration {
        let delay = match self.latest() {
            None => config.base_delay(),
            Some(t) if !t.value.is_empty_value() && self.streak >= 2 => {
                config.settle_delay() * (self.streak - 1)
            }
            Some(t) => config.base_delay() * t.count,
        };
        delay.min(config.max_delay())
    }
}

/// Runs the sampling loop and memoizes the result per key for one run
pub struct ConsensusSampler<T> {
    config: ConsensusConfig,
    memo: HashMap<String, T>,
}

impl<T: ConsensusValue> ConsensusSampler<T> {
    pub fn new(config: ConsensusConfig) -> Self {
        Self {
            config,
            memo: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Stable answer for `key`
    ///
    /// Query errors consume budget; if no call succeeded the key is
    /// reported as unavailable and nothing is memoized.
    pub async fn stabilize<F, Fut>(
        &mut self,
        service: &'static str,
        key: &str,
        mut query: F,
    ) -> CatalogResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CatalogResult<T>>,
    {
        if let Some(value) = self.memo.get(key) {
            return Ok(value.clone());
        }

        let mut obs = ConsensusObservation::new();
        let mut last_error = None;

        while obs.samples() < self.config.max_samples.max(1) {
            let delay = match query().await {
                Ok(value) => {
                    obs.observe(value);
                    if obs.is_settled(&self.config) {
                        break;
                    }
                    obs.next_delay(&self.config)
                }
                Err(e) => {
                    tracing::debug!(service, key, error = %e, "Consensus sample failed");
                    obs.fail();
                    last_error = Some(e);
                    self.config.base_delay().min(self.config.max_delay())
                }
            };

            if obs.samples() < self.config.max_samples && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let Some(winner) = obs.winner().cloned() else {
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no samples".to_string());
            return Err(CatalogError::unavailable(service, key, reason));
        };

        tracing::debug!(
            service,
            key,
            samples = obs.samples(),
            failures = obs.failures,
            count = obs.count(&winner),
            empty = winner.is_empty_value(),
            "Consensus reached"
        );

        self.memo.insert(key.to_string(), winner.clone());
        Ok(winner)
    }
}

/// Knowledge service seen through the consensus layer
pub struct StableKnowledge<K> {
    service: K,
    sampler: ConsensusSampler<KnowledgeAnswer>,
}

impl<K: KnowledgeService> StableKnowledge<K> {
    pub fn new(service: K, config: ConsensusConfig) -> Self {
        Self {
            service,
            sampler: ConsensusSampler::new(config),
        }
    }

    pub async fn answer(&mut self, id: &CanonicalId) -> CatalogResult<KnowledgeAnswer> {
        let service = &self.service;
        self.sampler
            .stabilize("wikidata", id.as_str(), || service.query(id))
            .await
    }
}
