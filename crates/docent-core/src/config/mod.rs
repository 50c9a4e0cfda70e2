mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};
use docent_index::document::{IngestionConfig, SplitterConfig};

use crate::generator::GenerationSettings;
use crate::session::RetrievalSettings;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.model.trim().is_empty() {
            bail!("llm.model must not be empty");
        }
        if self.llm.embedding_model.trim().is_empty() {
            bail!("llm.embedding_model must not be empty");
        }
        if self.llm.temperature.is_nan() || self.llm.temperature < 0.0 {
            bail!("llm.temperature must not be negative, got {}", self.llm.temperature);
        }
        if self.llm.context_window == 0 {
            bail!("llm.context_window must be greater than 0");
        }
        if self.ingest.chunk_size == 0 {
            bail!("ingest.chunk_size must be greater than 0");
        }
        if self.ingest.chunk_overlap >= self.ingest.chunk_size {
            bail!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.ingest.chunk_overlap,
                self.ingest.chunk_size
            );
        }
        if self.ingest.embed_batch_size == 0 {
            bail!("ingest.embed_batch_size must be greater than 0");
        }
        if self.retrieval.k == 0 {
            bail!("retrieval.k must be greater than 0");
        }
        if !(-1.0..=1.0).contains(&self.retrieval.score_threshold) {
            bail!(
                "retrieval.score_threshold must be within [-1, 1], got {}",
                self.retrieval.score_threshold
            );
        }
        if self.timeouts.llm_seconds == 0 || self.timeouts.embedding_seconds == 0 {
            bail!("timeouts must be greater than 0 seconds");
        }
        Ok(())
    }
}

impl Config {
    #[must_use]
    pub fn splitter_config(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.ingest.chunk_size,
            chunk_overlap: self.ingest.chunk_overlap,
            sentence_aware: self.ingest.sentence_aware,
        }
    }

    #[must_use]
    pub fn ingestion_config(&self) -> IngestionConfig {
        IngestionConfig {
            embed_batch_size: self.ingest.embed_batch_size,
            parallel_files: self.ingest.parallel_files,
            parallel_batches: self.ingest.parallel_batches,
            embed_timeout: Some(self.timeouts.embedding()),
        }
    }

    #[must_use]
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            temperature: self.llm.temperature,
            context_window: self.llm.context_window,
            timeout: self.timeouts.llm(),
        }
    }

    #[must_use]
    pub fn retrieval_settings(&self) -> RetrievalSettings {
        RetrievalSettings {
            k: self.retrieval.k,
            score_threshold: self.retrieval.score_threshold,
        }
    }
}
