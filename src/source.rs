// src/source.rs
//! Record source collaborator boundary.
//!
//! The pipeline does not parse file formats. Whatever holds the feedback
//! (CSV, spreadsheet exports, a database) is wrapped in a `RecordSource`
//! that yields raw records; the core only requires the sequence to be
//! finite and re-iterable (chunking restarts it for auto-sizing).

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::{normalize_full, normalize_light};

/// A raw feedback record as produced by a `RecordSource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub text: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RawRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rating: None,
            timestamp: None,
        }
    }

    pub fn with_rating(text: impl Into<String>, rating: f64) -> Self {
        Self {
            text: text.into(),
            rating: Some(rating),
            timestamp: None,
        }
    }
}

/// A materialized record inside one chunk. Normalized forms are derived
/// once here and cached; the record is immutable afterwards and owned by
/// the chunk worker until the chunk is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub raw_text: String,
    pub normalized_text: String,
    pub light_text: String,
    pub rating: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Record {
    pub fn materialize(id: u64, raw: RawRecord) -> Self {
        let normalized_text = normalize_full(&raw.text);
        let light_text = normalize_light(&raw.text);
        Self {
            id,
            raw_text: raw.text,
            normalized_text,
            light_text,
            rating: raw.rating,
            timestamp: raw.timestamp,
        }
    }

    /// Approximate heap + struct footprint in bytes, used for memory
    /// snapshots and chunk auto-sizing.
    pub fn approx_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.raw_text.len()
            + self.normalized_text.len()
            + self.light_text.len()
    }
}

/// Finite, re-iterable sequence of raw records. Each call to `iter` must
/// restart the sequence from the beginning and yield the same records in
/// the same order.
pub trait RecordSource: Send + Sync {
    fn iter(&self) -> Result<Box<dyn Iterator<Item = RawRecord> + Send + '_>>;
    fn name(&self) -> &'static str;
}

/// In-memory source for tests and callers that already hold their records.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    records: Vec<RawRecord>,
}

impl VecSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    /// Convenience: texts only, no ratings.
    pub fn from_texts<S: Into<String>>(texts: Vec<S>) -> Self {
        Self::new(texts.into_iter().map(|t| RawRecord::new(t)).collect())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSource for VecSource {
    fn iter(&self) -> Result<Box<dyn Iterator<Item = RawRecord> + Send + '_>> {
        Ok(Box::new(self.records.iter().cloned()))
    }

    fn name(&self) -> &'static str {
        "vec"
    }
}

/// Source that always fails to read; exercises the fatal `SourceRead` path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSource;

impl RecordSource for FailingSource {
    fn iter(&self) -> Result<Box<dyn Iterator<Item = RawRecord> + Send + '_>> {
        Err(anyhow::anyhow!("underlying store is unreadable"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_caches_both_normal_forms() {
        let r = Record::materialize(7, RawRecord::new("  Excelente SERVICIO!! "));
        assert_eq!(r.id, 7);
        assert_eq!(r.normalized_text, "excelente servicio");
        assert_eq!(r.light_text, "excelente servicio!!");
        assert!(r.approx_bytes() > r.raw_text.len());
    }

    #[test]
    fn vec_source_is_restartable() {
        let src = VecSource::from_texts(vec!["a", "b", "c"]);
        let first: Vec<_> = src.iter().unwrap().collect();
        let second: Vec<_> = src.iter().unwrap().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn failing_source_errors_on_iter() {
        assert!(FailingSource.iter().is_err());
    }
}
