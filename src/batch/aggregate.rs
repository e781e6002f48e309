// src/batch/aggregate.rs
//! Aggregator: reduces per-chunk results into dataset-level metrics.
//!
//! The fold is commutative and associative — only sums and merges of
//! commutative tallies — so parallel completion order never changes the
//! outcome. Percentage metrics are count-weighted across chunks
//! (Σ counts / Σ denominators), never an unweighted mean of per-chunk
//! percentages. A chunk whose analysis failed is excluded from that
//! analysis only; its other analyses still contribute.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PipelineError;
use crate::ratings::{csi, nps, CsiBand, RatingTally};
use crate::batch::worker::ChunkResult;

/// Dataset-level totals and weighted percentages; the pipeline's sole
/// durable output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub total_records: usize,
    pub total_chunks: usize,
    /// Chunks that recorded at least one analysis failure.
    pub failed_chunks: usize,
    /// Redundant records / records examined for duplicates, in [0, 1].
    pub duplication_rate: f64,
    /// Total duplicate groups across chunks (chunk-local groups).
    pub duplicate_groups: usize,
    /// Percentage of records per dominant emotion, weighted by chunk size.
    pub emotion_percentages: BTreeMap<String, f64>,
    /// Percentage of theme-scored records per dominant theme.
    pub theme_percentages: BTreeMap<String, f64>,
    pub nps: f64,
    pub csi: f64,
    pub csi_band: CsiBand,
}

/// Commutative reduction over all chunk results. Fails only when zero
/// chunks produced anything usable — the caller never gets a silent empty
/// report.
pub fn reduce(chunks: &[ChunkResult]) -> Result<AggregateResult, PipelineError> {
    let usable = chunks.iter().any(|c| {
        c.duplicate_stats.is_some()
            || c.emotion_stats.is_some()
            || c.theme_stats.is_some()
            || c.ratings.count > 0
    });
    if !usable {
        return Err(PipelineError::Aggregation(if chunks.is_empty() {
            "no chunks were produced".into()
        } else {
            format!("all {} chunks failed", chunks.len())
        }));
    }

    let total_records: usize = chunks.iter().map(|c| c.size).sum();
    let failed_chunks = chunks.iter().filter(|c| c.error.is_some()).count();

    // Duplicates: weight by the size of chunks that completed the analysis.
    let mut dup_redundant = 0usize;
    let mut dup_examined = 0usize;
    let mut duplicate_groups = 0usize;
    for c in chunks {
        if let Some(d) = &c.duplicate_stats {
            dup_redundant += d.duplicates;
            dup_examined += c.size;
            duplicate_groups += d.groups.len();
        }
    }
    let duplication_rate = if dup_examined > 0 {
        dup_redundant as f64 / dup_examined as f64
    } else {
        0.0
    };

    // Emotions / themes: merge dominant-label counts with each analysis's
    // own denominator.
    let (emotion_counts, emotion_scored) =
        merge_counts(chunks.iter().filter_map(|c| c.emotion_stats.as_ref()));
    let (theme_counts, theme_scored) =
        merge_counts(chunks.iter().filter_map(|c| c.theme_stats.as_ref()));

    // Ratings: one merged tally drives both indices.
    let mut tally = RatingTally::default();
    for c in chunks {
        tally.merge(&c.ratings);
    }
    let csi_score = csi(&tally);

    Ok(AggregateResult {
        total_records,
        total_chunks: chunks.len(),
        failed_chunks,
        duplication_rate,
        duplicate_groups,
        emotion_percentages: percentages(emotion_counts, emotion_scored),
        theme_percentages: percentages(theme_counts, theme_scored),
        nps: nps(&tally),
        csi: csi_score,
        csi_band: CsiBand::from_score(csi_score),
    })
}

fn merge_counts<'a>(
    stats: impl Iterator<Item = &'a crate::batch::worker::CategoryStats>,
) -> (BTreeMap<String, usize>, usize) {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut scored = 0usize;
    for s in stats {
        for (name, n) in &s.counts {
            *counts.entry(name.clone()).or_insert(0) += n;
        }
        scored += s.scored;
    }
    (counts, scored)
}

fn percentages(counts: BTreeMap<String, usize>, scored: usize) -> BTreeMap<String, f64> {
    if scored == 0 {
        return BTreeMap::new();
    }
    counts
        .into_iter()
        .map(|(name, n)| (name, n as f64 / scored as f64 * 100.0))
        .collect()
}
