// src/batch/mod.rs
//! Batch pipeline: chunking, workers, scheduling, aggregation.

pub mod aggregate;
pub mod chunker;
pub mod scheduler;
pub mod worker;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

pub use aggregate::{reduce, AggregateResult};
pub use scheduler::{BatchOutcome, BatchScheduler, SchedulerState};
pub use worker::{CategoryStats, ChunkResult, WorkerContext};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::source::RecordSource;

/// One-time metrics registration (so series show up on whatever exporter
/// the embedding application installs).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_chunks_total", "Chunks processed.");
        describe_counter!(
            "pipeline_chunk_errors_total",
            "Chunks with at least one failed analysis."
        );
        describe_counter!("pipeline_records_total", "Records processed across chunks.");
        describe_counter!(
            "pipeline_reclaims_total",
            "Reclamation points hit in sequential mode."
        );
        describe_counter!(
            "classifier_fallback_total",
            "External classifier failures recovered by lexical fallback."
        );
        describe_histogram!("pipeline_chunk_ms", "Chunk processing time in milliseconds.");
        describe_gauge!(
            "pipeline_memory_snapshot_mb",
            "Estimated footprint of the most recent chunk."
        );
    });
}

/// Run the full pipeline over a source with the given configuration.
/// Convenience wrapper over `BatchScheduler` for callers that do not need
/// to inspect scheduler state or swap tables/classifier.
pub fn run_pipeline(
    cfg: PipelineConfig,
    source: &dyn RecordSource,
) -> Result<BatchOutcome, PipelineError> {
    BatchScheduler::new(cfg)?.run(source)
}
