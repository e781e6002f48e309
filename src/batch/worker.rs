// src/batch/worker.rs
//! Chunk worker: runs the requested analyses over one chunk and returns a
//! structured `ChunkResult`.
//!
//! Pure apart from logging: no I/O, no shared mutable state. Each call
//! builds its own detector instances; the only thing shared with other
//! workers is the read-only category tables behind `Arc`. A failing
//! analysis is caught, recorded on `error`, and the remaining analyses
//! still return their results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::classifier::{classify_or_fallback, ExternalClassifier};
use crate::config::AnalysisSelection;
use crate::duplicates::{self, DuplicateStats, FuzzyPair};
use crate::lexicon::{CategoryTable, EMOTION_TABLE, THEME_TABLE};
use crate::ratings::RatingTally;
use crate::scoring::LexicalScorer;
use crate::source::Record;

/// Dominant-label counts for one analysis over one chunk. `scored` is the
/// number of records that produced a non-empty vector, i.e. the chunk's
/// denominator for this analysis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryStats {
    pub counts: BTreeMap<String, usize>,
    pub scored: usize,
}

/// Everything a worker needs, shareable read-only across the pool.
#[derive(Clone)]
pub struct WorkerContext {
    pub emotion_table: Arc<CategoryTable>,
    pub theme_table: Arc<CategoryTable>,
    pub selection: AnalysisSelection,
    /// Fuzzy near-duplicate threshold; `None` disables the O(n²) scan.
    pub fuzzy_threshold: Option<f64>,
    pub classifier: Option<Arc<dyn ExternalClassifier>>,
}

impl WorkerContext {
    pub fn new(selection: AnalysisSelection) -> Self {
        Self {
            emotion_table: EMOTION_TABLE.clone(),
            theme_table: THEME_TABLE.clone(),
            selection,
            fuzzy_threshold: None,
            classifier: None,
        }
    }
}

/// Result of processing one chunk. Produced exactly once, never mutated,
/// owned by the aggregator afterwards. `None` stats mean the analysis was
/// not requested or failed (failures land in `error`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkResult {
    pub chunk_id: usize,
    pub size: usize,
    pub duplicate_stats: Option<DuplicateStats>,
    pub fuzzy_pairs: Vec<FuzzyPair>,
    pub emotion_stats: Option<CategoryStats>,
    pub theme_stats: Option<CategoryStats>,
    pub ratings: RatingTally,
    pub memory_snapshot_mb: f64,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

/// Process one chunk. The chunk is owned here and dropped on return; only
/// the result survives.
pub fn process(ctx: &WorkerContext, chunk_id: usize, records: Vec<Record>) -> ChunkResult {
    let started = Instant::now();
    let mut errors: Vec<String> = Vec::new();

    let duplicate_stats = if ctx.selection.duplicates {
        run_isolated("duplicates", &mut errors, || duplicates::analyze(&records))
    } else {
        None
    };

    let fuzzy_pairs = match (ctx.selection.duplicates, ctx.fuzzy_threshold) {
        (true, Some(threshold)) => {
            run_isolated("fuzzy_pairs", &mut errors, || {
                duplicates::fuzzy_pairs(&records, threshold)
            })
            .unwrap_or_default()
        }
        _ => Vec::new(),
    };

    let emotion_stats = if ctx.selection.emotions {
        let scorer = LexicalScorer::new(ctx.emotion_table.clone());
        let classifier = ctx.classifier.as_deref();
        run_isolated("emotions", &mut errors, || {
            score_chunk(&records, |r| {
                classify_or_fallback(classifier, &r.raw_text, scorer.score(&r.raw_text))
            })
        })
    } else {
        None
    };

    let theme_stats = if ctx.selection.themes {
        let scorer = LexicalScorer::new(ctx.theme_table.clone());
        run_isolated("themes", &mut errors, || {
            score_chunk(&records, |r| scorer.score(&r.raw_text))
        })
    } else {
        None
    };

    let mut ratings = RatingTally::default();
    for r in records.iter().filter_map(|r| r.rating) {
        ratings.add(r);
    }

    let memory_snapshot_mb = approx_chunk_mb(&records);
    let elapsed_ms = started.elapsed().as_millis() as u64;
    debug!(
        chunk_id,
        size = records.len(),
        elapsed_ms,
        memory_snapshot_mb,
        errors = errors.len(),
        "chunk processed"
    );

    ChunkResult {
        chunk_id,
        size: records.len(),
        duplicate_stats,
        fuzzy_pairs,
        emotion_stats,
        theme_stats,
        ratings,
        memory_snapshot_mb,
        elapsed_ms,
        error: if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        },
    }
}

/// Dominant-label tally over one chunk for one scorer.
fn score_chunk<F>(records: &[Record], score: F) -> CategoryStats
where
    F: Fn(&Record) -> crate::scoring::ScoreVector,
{
    let mut stats = CategoryStats::default();
    for r in records {
        let v = score(r);
        if let Some(dominant) = v.dominant() {
            *stats.counts.entry(dominant.to_string()).or_insert(0) += 1;
            stats.scored += 1;
        }
    }
    stats
}

/// Run one analysis, converting a panic into a recorded error instead of
/// poisoning the whole chunk.
fn run_isolated<T>(name: &str, errors: &mut Vec<String>, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(v) => Some(v),
        Err(cause) => {
            let msg = if let Some(s) = cause.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = cause.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            errors.push(format!("{name}: {msg}"));
            None
        }
    }
}

/// Approximate chunk footprint in MB: record heap plus struct sizes.
fn approx_chunk_mb(records: &[Record]) -> f64 {
    let bytes: usize = records.iter().map(|r| r.approx_bytes()).sum();
    bytes as f64 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::MockClassifier;
    use crate::scoring::ScoreVector;
    use crate::source::RawRecord;

    fn chunk(texts: Vec<(&str, Option<f64>)>) -> Vec<Record> {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, (t, rating))| {
                let mut raw = RawRecord::new(t);
                raw.rating = rating;
                Record::materialize(i as u64, raw)
            })
            .collect()
    }

    #[test]
    fn full_selection_fills_all_stats() {
        let ctx = WorkerContext::new(AnalysisSelection::all());
        let res = process(
            &ctx,
            0,
            chunk(vec![
                ("Excelente servicio", Some(9.0)),
                ("Excelente servicio", Some(9.0)),
                ("Terrible servicio", Some(2.0)),
            ]),
        );
        assert_eq!(res.size, 3);
        assert!(res.error.is_none());

        let dup = res.duplicate_stats.unwrap();
        assert_eq!(dup.groups.len(), 1);
        assert_eq!(dup.duplicates, 1);

        let emo = res.emotion_stats.unwrap();
        assert_eq!(emo.scored, 3);
        assert_eq!(emo.counts["alegria"], 2);
        assert_eq!(emo.counts["enojo"], 1);

        let th = res.theme_stats.unwrap();
        assert_eq!(th.counts["atencion_cliente"], 3);

        assert_eq!(res.ratings.count, 3);
        assert_eq!(res.ratings.promoters, 2);
        assert!(res.memory_snapshot_mb > 0.0);
    }

    #[test]
    fn unselected_analyses_stay_none() {
        let ctx = WorkerContext::new(AnalysisSelection {
            duplicates: true,
            emotions: false,
            themes: false,
        });
        let res = process(&ctx, 1, chunk(vec![("algo", None)]));
        assert!(res.duplicate_stats.is_some());
        assert!(res.emotion_stats.is_none());
        assert!(res.theme_stats.is_none());
    }

    #[test]
    fn theme_empty_vectors_do_not_count_as_scored() {
        let ctx = WorkerContext::new(AnalysisSelection::all());
        let res = process(&ctx, 0, chunk(vec![("", None), ("Excelente precio", None)]));
        let th = res.theme_stats.unwrap();
        assert_eq!(th.scored, 1);
        // Emotion always scores: the empty record lands on neutral.
        let emo = res.emotion_stats.unwrap();
        assert_eq!(emo.scored, 2);
        assert_eq!(emo.counts["neutral"], 1);
    }

    #[test]
    fn classifier_override_changes_emotion_counts() {
        let over = ScoreVector::from_weights(vec![("tristeza".into(), 1.0)]);
        let mut ctx = WorkerContext::new(AnalysisSelection::all());
        ctx.classifier = Some(Arc::new(MockClassifier::fixed(over)));
        let res = process(&ctx, 0, chunk(vec![("Excelente servicio", None)]));
        let emo = res.emotion_stats.unwrap();
        assert_eq!(emo.counts["tristeza"], 1);
        assert!(!emo.counts.contains_key("alegria"));
    }

    #[test]
    fn failing_classifier_falls_back_to_lexical() {
        let mut ctx = WorkerContext::new(AnalysisSelection::all());
        ctx.classifier = Some(Arc::new(MockClassifier::failing()));
        let res = process(&ctx, 0, chunk(vec![("Excelente servicio", None)]));
        assert!(res.error.is_none(), "classifier failure must not fail the chunk");
        let emo = res.emotion_stats.unwrap();
        assert_eq!(emo.counts["alegria"], 1);
    }

    #[test]
    fn fuzzy_scan_only_when_enabled() {
        let mut ctx = WorkerContext::new(AnalysisSelection::all());
        let records = vec![
            ("el pedido llegó muy tarde hoy", None),
            ("el pedido llegó muy tarde hoy!", None),
        ];
        let res = process(&ctx, 0, chunk(records.clone()));
        assert!(res.fuzzy_pairs.is_empty());

        ctx.fuzzy_threshold = Some(0.9);
        let res2 = process(&ctx, 0, chunk(records));
        assert_eq!(res2.fuzzy_pairs.len(), 1);
    }

    #[test]
    fn panicking_analysis_is_recorded_not_propagated() {
        let mut errors = Vec::new();
        let out: Option<()> = run_isolated("boom", &mut errors, || panic!("detector exploded"));
        assert!(out.is_none());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("boom") && errors[0].contains("detector exploded"));
    }
}
