//! Mock External Services
//!
//! Stand-ins for the attribute API and the knowledge service with call
//! counters, so tests can assert how often each was hit.

use async_trait::async_trait;
use cineboot_catalog::error::{CatalogError, CatalogResult};
use cineboot_catalog::tier1::{AttributeSource, KnowledgeAnswer, KnowledgeService};
use cineboot_catalog::types::{Attributes, CanonicalId};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Attribute API answering from a fixed table
#[derive(Default)]
pub struct MockAttributes {
    answers: HashMap<String, Attributes>,
    calls: AtomicU32,
}

impl MockAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, attrs: Attributes) -> Self {
        self.answers.insert(id.to_string(), attrs);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttributeSource for MockAttributes {
    async fn get(&self, id: &CanonicalId) -> CatalogResult<Option<Attributes>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answers.get(id.as_str()).cloned())
    }
}

/// One scripted reply of the knowledge service
#[derive(Debug, Clone)]
pub enum Reply {
    Answer(KnowledgeAnswer),
    Timeout,
}

/// Knowledge service replaying a script per id
///
/// Each id's script is cycled; ids without a script get an empty answer.
#[derive(Default)]
pub struct ScriptedKnowledge {
    scripts: HashMap<String, Vec<Reply>>,
    cursor: Mutex<HashMap<String, usize>>,
    calls: AtomicU32,
}

impl ScriptedKnowledge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always the same answer for `id`
    pub fn with(self, id: &str, countries: &[&str], filmaffinity: Option<u64>) -> Self {
        self.with_script(id, vec![Reply::Answer(answer(countries, filmaffinity))])
    }

    pub fn with_script(mut self, id: &str, script: Vec<Reply>) -> Self {
        self.scripts.insert(id.to_string(), script);
        self
    }

    /// Every query for `id` times out
    pub fn down_for(self, id: &str) -> Self {
        self.with_script(id, vec![Reply::Timeout])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeService for ScriptedKnowledge {
    async fn query(&self, id: &CanonicalId) -> CatalogResult<KnowledgeAnswer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(script) = self.scripts.get(id.as_str()) else {
            return Ok(KnowledgeAnswer::default());
        };

        let step = {
            let mut cursor = self.cursor.lock().unwrap();
            let step = cursor.entry(id.to_string()).or_insert(0);
            let current = *step;
            *step += 1;
            current
        };

        match &script[step % script.len()] {
            Reply::Answer(a) => Ok(a.clone()),
            Reply::Timeout => Err(CatalogError::unavailable("wikidata", id.as_str(), "timeout")),
        }
    }
}

pub fn answer(countries: &[&str], filmaffinity: Option<u64>) -> KnowledgeAnswer {
    KnowledgeAnswer {
        countries: countries.iter().map(|c| c.to_string()).collect::<BTreeSet<_>>(),
        filmaffinity,
        wikipedia: None,
    }
}
