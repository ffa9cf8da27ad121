//! Provider Record Builder

use chrono::NaiveDate;
use cineboot_catalog::types::{CanonicalId, SourceRecord};

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Builder for [`SourceRecord`] with only the fields a test cares about
pub struct RecordBuilder(SourceRecord);

impl RecordBuilder {
    pub fn new(provider: &str, id: &str, title: &str) -> Self {
        Self(SourceRecord {
            provider: provider.to_string(),
            id: id.to_string(),
            title: title.to_string(),
            ..Default::default()
        })
    }

    pub fn year(mut self, year: i32) -> Self {
        self.0.year = Some(year);
        self
    }

    pub fn director(mut self, name: &str) -> Self {
        self.0.directors.push(name.to_string());
        self
    }

    pub fn cast(mut self, names: &[&str]) -> Self {
        self.0.cast = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn audio(mut self, langs: &[&str]) -> Self {
        self.0.audio = langs.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn subtitles(mut self, langs: &[&str]) -> Self {
        self.0.subtitles = langs.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn canonical(mut self, id: &str) -> Self {
        self.0.canonical_id = CanonicalId::parse(id);
        self
    }

    pub fn published(mut self, date: NaiveDate) -> Self {
        self.0.published = Some(date);
        self
    }

    pub fn expires(mut self, date: NaiveDate) -> Self {
        self.0.expires = Some(date);
        self
    }

    pub fn build(self) -> SourceRecord {
        self.0
    }
}
