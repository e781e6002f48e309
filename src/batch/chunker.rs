// src/batch/chunker.rs
//! Chunk source: turns a `RecordSource` iteration into a lazy, finite
//! sequence of bounded record groups.
//!
//! Chunking is restartable: re-iterating the same source with the same
//! size yields identical chunks (ids included), because ids are assigned
//! sequentially from zero at materialization time.

use anyhow::Result;
use tracing::debug;

use crate::source::{RawRecord, Record, RecordSource};

pub const MIN_CHUNK_SIZE: usize = 50;
pub const MAX_CHUNK_SIZE: usize = 5_000;
/// Records sampled when estimating per-record memory cost.
pub const AUTO_SIZE_SAMPLE: usize = 32;
/// Working-set multiplier: chunks plus per-chunk scoring scratch.
pub const OVERHEAD_FACTOR: f64 = 2.0;

/// Iterator adapter yielding materialized chunks of at most `size` records,
/// source order preserved.
pub struct Chunks<I> {
    inner: I,
    size: usize,
    next_id: u64,
}

impl<I> Chunks<I> {
    pub fn new(inner: I, size: usize) -> Self {
        Self {
            inner,
            size: size.max(1),
            next_id: 0,
        }
    }
}

impl<I: Iterator<Item = RawRecord>> Iterator for Chunks<I> {
    type Item = Vec<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut chunk = Vec::with_capacity(self.size);
        while chunk.len() < self.size {
            match self.inner.next() {
                Some(raw) => {
                    chunk.push(Record::materialize(self.next_id, raw));
                    self.next_id += 1;
                }
                None => break,
            }
        }
        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }
}

/// Convenience constructor over a raw-record iterator.
pub fn chunks<I: Iterator<Item = RawRecord>>(iter: I, size: usize) -> Chunks<I> {
    Chunks::new(iter, size)
}

/// Estimate a chunk size from a memory budget: sample the first records,
/// take their average materialized footprint, and fit
/// `budget / (cost · OVERHEAD_FACTOR)` into [MIN, MAX].
pub fn auto_chunk_size(source: &dyn RecordSource, target_memory_mb: f64) -> Result<usize> {
    let mut iter = source.iter()?;
    let mut sampled = 0usize;
    let mut bytes = 0usize;
    for _ in 0..AUTO_SIZE_SAMPLE {
        match iter.next() {
            Some(raw) => {
                bytes += Record::materialize(0, raw).approx_bytes();
                sampled += 1;
            }
            None => break,
        }
    }

    if sampled == 0 {
        return Ok(MIN_CHUNK_SIZE);
    }

    let per_record = (bytes as f64 / sampled as f64).max(1.0);
    let budget_bytes = target_memory_mb * 1024.0 * 1024.0;
    let fit = budget_bytes / (per_record * OVERHEAD_FACTOR);
    let size = (fit as usize).clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
    debug!(
        sampled,
        per_record_bytes = per_record,
        chunk_size = size,
        "auto-sized chunks"
    );
    Ok(size)
}
