use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub llm: LlmConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// LLM provider backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    /// Offline stand-in, only usable when built with the `mock` feature.
    Mock,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Mock => "mock",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Tokens, forwarded to the backend as `num_ctx`.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_context_window() -> usize {
    4096
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_true")]
    pub sentence_aware: bool,
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
    #[serde(default = "default_parallel_files")]
    pub parallel_files: usize,
    #[serde(default = "default_parallel_batches")]
    pub parallel_batches: usize,
    /// Bytes. Larger files are skipped.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_source_dir() -> String {
    "internal_information".into()
}

fn default_extension() -> String {
    "pdf".into()
}

fn default_chunk_size() -> usize {
    1024
}

fn default_chunk_overlap() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_embed_batch_size() -> usize {
    32
}

fn default_parallel_files() -> usize {
    4
}

fn default_parallel_batches() -> usize {
    2
}

fn default_max_file_size() -> u64 {
    docent_index::document::DEFAULT_MAX_FILE_SIZE
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            extension: default_extension(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            sentence_aware: true,
            embed_batch_size: default_embed_batch_size(),
            parallel_files: default_parallel_files(),
            parallel_batches: default_parallel_batches(),
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: String,
}

fn default_index_path() -> String {
    "internal_db".into()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    /// Minimum cosine similarity for a chunk to be used as context.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
}

fn default_k() -> usize {
    10
}

fn default_score_threshold() -> f32 {
    0.2
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            score_threshold: default_score_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_llm_timeout")]
    pub llm_seconds: u64,
    #[serde(default = "default_embedding_timeout")]
    pub embedding_seconds: u64,
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_embedding_timeout() -> u64 {
    30
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_seconds: default_llm_timeout(),
            embedding_seconds: default_embedding_timeout(),
        }
    }
}

impl TimeoutConfig {
    #[must_use]
    pub fn llm(&self) -> Duration {
        Duration::from_secs(self.llm_seconds)
    }

    #[must_use]
    pub fn embedding(&self) -> Duration {
        Duration::from_secs(self.embedding_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: ProviderKind::Ollama,
                base_url: "http://localhost:11434".into(),
                model: "llama3".into(),
                embedding_model: default_embedding_model(),
                temperature: default_temperature(),
                context_window: default_context_window(),
            },
            ingest: IngestConfig::default(),
            index: IndexConfig::default(),
            retrieval: RetrievalConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}
