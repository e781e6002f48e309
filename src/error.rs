// src/error.rs
//! Pipeline error taxonomy.
//!
//! Only two conditions abort a run: the record source cannot be read at
//! all, or zero chunks produced a usable result. Everything else is
//! recovered and surfaced on the affected `ChunkResult` instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The `RecordSource` could not yield any chunk; the run fails.
    #[error("record source `{source_name}` failed: {message}")]
    SourceRead {
        source_name: String,
        message: String,
    },

    /// Zero chunks produced any usable result (all failed, or the source
    /// was empty). Callers never receive a silent empty report.
    #[error("aggregation impossible: {0}")]
    Aggregation(String),

    /// Invalid configuration rejected at construction time.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_source() {
        let e = PipelineError::SourceRead {
            source_name: "vec".into(),
            message: "boom".into(),
        };
        let s = e.to_string();
        assert!(s.contains("vec") && s.contains("boom"));
    }
}
