// src/config.rs
//! Pipeline configuration: defaults, TOML loading with an environment
//! override for the path, and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

pub const ENV_CONFIG_PATH: &str = "FEEDBACK_ANALYTICS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/pipeline.toml";

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.95;
pub const DEFAULT_TARGET_MEMORY_MB: f64 = 256.0;
pub const DEFAULT_RECLAIM_EVERY: usize = 5;

/// Which analyses a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSelection {
    #[serde(default = "yes")]
    pub duplicates: bool,
    #[serde(default = "yes")]
    pub emotions: bool,
    #[serde(default = "yes")]
    pub themes: bool,
}

fn yes() -> bool {
    true
}

impl Default for AnalysisSelection {
    fn default() -> Self {
        Self {
            duplicates: true,
            emotions: true,
            themes: true,
        }
    }
}

impl AnalysisSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn none_selected(&self) -> bool {
        !self.duplicates && !self.emotions && !self.themes
    }
}

/// Configuration surface consumed by the core pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Records per chunk; `None` auto-sizes from `target_memory_mb`.
    #[serde(default)]
    pub chunk_size: Option<usize>,
    /// Worker threads for parallel mode. `1` runs sequentially on the
    /// calling thread; `0` means "all available cores".
    #[serde(default = "default_workers")]
    pub worker_count: usize,
    /// Fuzzy near-duplicate similarity threshold, in (0, 1].
    #[serde(default = "default_similarity")]
    pub similarity_threshold: f64,
    /// Pairwise fuzzy scan is O(n²) per chunk; off unless asked for.
    #[serde(default)]
    pub fuzzy_pairs: bool,
    #[serde(default)]
    pub analyses: AnalysisSelection,
    #[serde(default = "default_memory_mb")]
    pub target_memory_mb: f64,
    /// Sequential mode runs a reclamation pass every Nth chunk.
    #[serde(default = "default_reclaim")]
    pub reclaim_every: usize,
}

fn default_workers() -> usize {
    1
}

fn default_similarity() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

fn default_memory_mb() -> f64 {
    DEFAULT_TARGET_MEMORY_MB
}

fn default_reclaim() -> usize {
    DEFAULT_RECLAIM_EVERY
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: None,
            worker_count: default_workers(),
            similarity_threshold: default_similarity(),
            fuzzy_pairs: false,
            analyses: AnalysisSelection::default(),
            target_memory_mb: default_memory_mb(),
            reclaim_every: default_reclaim(),
        }
    }
}

impl PipelineConfig {
    /// Reject configurations the pipeline cannot honor.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if let Some(0) = self.chunk_size {
            return Err(PipelineError::Config("chunk_size must be ≥ 1".into()));
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(PipelineError::Config(format!(
                "similarity_threshold must be in (0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.analyses.none_selected() {
            return Err(PipelineError::Config(
                "at least one analysis must be requested".into(),
            ));
        }
        if !(self.target_memory_mb > 0.0) {
            return Err(PipelineError::Config(format!(
                "target_memory_mb must be positive, got {}",
                self.target_memory_mb
            )));
        }
        if self.reclaim_every == 0 {
            return Err(PipelineError::Config("reclaim_every must be ≥ 1".into()));
        }
        Ok(())
    }

    /// Worker threads after resolving `0` to the machine's core count.
    pub fn effective_workers(&self) -> usize {
        if self.worker_count == 0 {
            num_cpus::get()
        } else {
            self.worker_count
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate().map_err(|e| anyhow!(e))?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks:
    /// 1) `$FEEDBACK_ANALYTICS_CONFIG`
    /// 2) `config/pipeline.toml`
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::from_toml_file(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::from_toml_file(&default_p);
        }
        Ok(Self::default())
    }
}
