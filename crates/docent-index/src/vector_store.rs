use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::document::PageMetadata;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("vector has dimension {got}, index expects {expected}")]
    Dimension { expected: usize, got: usize },
    #[error("failed to persist index to {path}: {reason}")]
    Persist { path: String, reason: String },
    #[error("failed to load index from {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("index file {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Identity of the embedding function that produced an index's vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingScheme {
    pub model: String,
    pub dimension: usize,
}

impl std::fmt::Display for EmbeddingScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} dims)", self.model, self.dimension)
    }
}

/// One embedded chunk as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub content: String,
    pub metadata: PageMetadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub id: String,
    /// Cosine similarity in `[-1, 1]`, higher is more similar.
    pub score: f32,
    pub content: String,
    pub metadata: PageMetadata,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait VectorIndex: Send + Sync {
    fn scheme(&self) -> &EmbeddingScheme;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert entries, replacing any with the same id.
    fn upsert(&self, entries: Vec<IndexEntry>) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Return up to `limit` entries by descending score. Entries with equal
    /// scores keep insertion order.
    fn query(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredEntry>, VectorStoreError>>;

    /// Write the whole index under `location`, replacing what was there.
    fn persist<'a>(&'a self, location: &'a Path) -> BoxFuture<'a, Result<(), VectorStoreError>>;
}
