// src/lib.rs
// Public library surface for integration tests (and embedding pipelines).

pub mod classifier;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod lexicon;
pub mod normalize;
pub mod ratings;
pub mod scoring;
pub mod source;

// Batch pipeline (chunking, workers, scheduler, aggregation)
pub mod batch;

// ---- Re-exports for stable public API ----
pub use crate::batch::{
    run_pipeline, AggregateResult, BatchOutcome, BatchScheduler, ChunkResult, SchedulerState,
};
pub use crate::classifier::ExternalClassifier;
pub use crate::config::{AnalysisSelection, PipelineConfig};
pub use crate::duplicates::{DuplicateGroup, KeepPolicy};
pub use crate::error::PipelineError;
pub use crate::ratings::{CsiBand, RatingBand};
pub use crate::scoring::{LexicalScorer, ScoreVector};
pub use crate::source::{RawRecord, Record, RecordSource, VecSource};

/// Install a `tracing` subscriber for binaries and ad-hoc tools embedding
/// the pipeline. Respects `RUST_LOG`; safe to call more than once (later
/// calls are no-ops).
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
