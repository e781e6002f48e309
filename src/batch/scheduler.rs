// src/batch/scheduler.rs
//! Batch scheduler: drives chunks through workers, sequentially or on a
//! fixed-size worker pool, then hands all results to the aggregator.
//!
//! State machine: `Idle → Running → {Completed, Failed}`. `Failed` is
//! reserved for run-killing conditions — an unreadable record source or
//! zero usable chunk results. Individual chunk failures stay on their
//! `ChunkResult` and never fail the run.

use metrics::{counter, gauge, histogram};
use rayon::iter::{ParallelBridge, ParallelIterator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::batch::aggregate::{self, AggregateResult};
use crate::batch::chunker::{self, Chunks};
use crate::batch::worker::{self, ChunkResult, WorkerContext};
use crate::classifier::ExternalClassifier;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::lexicon::CategoryTable;
use crate::source::{RawRecord, Record, RecordSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Everything a run produces: the aggregate plus every per-chunk result
/// for the report sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub aggregate: AggregateResult,
    pub chunks: Vec<ChunkResult>,
}

pub struct BatchScheduler {
    cfg: PipelineConfig,
    ctx: WorkerContext,
    state: SchedulerState,
}

impl BatchScheduler {
    pub fn new(cfg: PipelineConfig) -> Result<Self, PipelineError> {
        cfg.validate()?;
        let mut ctx = WorkerContext::new(cfg.analyses);
        ctx.fuzzy_threshold = cfg.fuzzy_pairs.then_some(cfg.similarity_threshold);
        Ok(Self {
            cfg,
            ctx,
            state: SchedulerState::Idle,
        })
    }

    /// Replace the built-in category tables (e.g. TOML-loaded custom ones).
    pub fn with_tables(
        mut self,
        emotion: Arc<CategoryTable>,
        theme: Arc<CategoryTable>,
    ) -> Self {
        self.ctx.emotion_table = emotion;
        self.ctx.theme_table = theme;
        self
    }

    /// Attach an optional external classifier; its failures fall back to
    /// lexical scoring per record.
    pub fn with_classifier(mut self, classifier: Arc<dyn ExternalClassifier>) -> Self {
        self.ctx.classifier = Some(classifier);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Run the whole pipeline over a source. Blocks until every chunk has
    /// been processed and aggregated; no cancellation mid-run.
    pub fn run(&mut self, source: &dyn RecordSource) -> Result<BatchOutcome, PipelineError> {
        self.state = SchedulerState::Running;
        match self.execute(source) {
            Ok(outcome) => {
                self.state = SchedulerState::Completed;
                Ok(outcome)
            }
            Err(e) => {
                self.state = SchedulerState::Failed;
                Err(e)
            }
        }
    }

    fn execute(&self, source: &dyn RecordSource) -> Result<BatchOutcome, PipelineError> {
        crate::batch::ensure_metrics_described();

        let chunk_size = match self.cfg.chunk_size {
            Some(n) => n,
            None => chunker::auto_chunk_size(source, self.cfg.target_memory_mb)
                .map_err(|e| source_read(source, &e))?,
        };
        let iter = source.iter().map_err(|e| source_read(source, &e))?;
        let chunk_iter = chunker::chunks(iter, chunk_size);

        let workers = self.cfg.effective_workers();
        info!(
            source = source.name(),
            chunk_size,
            workers,
            "batch run started"
        );

        let results = if workers <= 1 {
            self.run_sequential(chunk_iter)
        } else {
            self.run_parallel(chunk_iter, workers)?
        };

        let aggregate = aggregate::reduce(&results)?;
        info!(
            total_records = aggregate.total_records,
            total_chunks = aggregate.total_chunks,
            failed_chunks = aggregate.failed_chunks,
            "batch run completed"
        );
        Ok(BatchOutcome {
            aggregate,
            chunks: results,
        })
    }

    /// One chunk at a time on the calling thread, with an explicit
    /// reclamation point every Nth chunk.
    fn run_sequential<I>(&self, chunks: Chunks<I>) -> Vec<ChunkResult>
    where
        I: Iterator<Item = RawRecord>,
    {
        let mut results = Vec::new();
        for (chunk_id, chunk) in chunks.enumerate() {
            let res = worker::process(&self.ctx, chunk_id, chunk);
            record_chunk_metrics(&res);
            results.push(res);
            if (chunk_id + 1) % self.cfg.reclaim_every == 0 {
                reclaim(chunk_id + 1);
            }
        }
        results
    }

    /// Fixed-size shared-nothing pool. Chunks stream through `par_bridge`
    /// so only in-flight chunks are materialized; the pool's collect is
    /// the barrier before aggregation. Collection order is irrelevant —
    /// the reduction is commutative.
    fn run_parallel<I>(
        &self,
        chunks: Chunks<I>,
        workers: usize,
    ) -> Result<Vec<ChunkResult>, PipelineError>
    where
        I: Iterator<Item = RawRecord> + Send,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| PipelineError::Config(format!("worker pool: {e}")))?;

        let ctx = &self.ctx;
        let results: Vec<ChunkResult> = pool.install(|| {
            chunks
                .enumerate()
                .par_bridge()
                .map(|(chunk_id, chunk): (usize, Vec<Record>)| {
                    let res = worker::process(ctx, chunk_id, chunk);
                    record_chunk_metrics(&res);
                    res
                })
                .collect()
        });
        Ok(results)
    }
}

fn source_read(source: &dyn RecordSource, e: &anyhow::Error) -> PipelineError {
    PipelineError::SourceRead {
        source_name: source.name().to_string(),
        message: e.to_string(),
    }
}

/// Explicit reclamation point in sequential mode. Per-chunk buffers are
/// already dropped deterministically when the chunk leaves scope; this
/// hook marks the boundary for telemetry and for runtimes layered on top.
fn reclaim(after_chunks: usize) {
    debug!(after_chunks, "reclamation point");
    counter!("pipeline_reclaims_total").increment(1);
}

fn record_chunk_metrics(res: &ChunkResult) {
    counter!("pipeline_chunks_total").increment(1);
    counter!("pipeline_records_total").increment(res.size as u64);
    if res.error.is_some() {
        counter!("pipeline_chunk_errors_total").increment(1);
    }
    histogram!("pipeline_chunk_ms").record(res.elapsed_ms as f64);
    gauge!("pipeline_memory_snapshot_mb").set(res.memory_snapshot_mb);
}
