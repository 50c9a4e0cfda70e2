//! Error types for docent-index.

use std::path::PathBuf;

use crate::document::DocumentError;
use crate::vector_store::VectorStoreError;

/// Errors raised by ingestion and retrieval.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Invalid chunking or pipeline settings, detected before any work starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("source folder not found: {}", .0.display())]
    SourceFolderMissing(PathBuf),

    /// Discovery matched nothing. The caller decides whether this is fatal.
    #[error("no .{extension} files found in {}", folder.display())]
    NoSourceFiles { folder: PathBuf, extension: String },

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// The index was built with a different embedding model or dimension.
    #[error("embedding scheme mismatch: index uses {expected}, embedder produced {actual}")]
    EmbeddingSchemeMismatch { expected: String, actual: String },

    #[error("embedder returned {got} vectors for {expected} inputs")]
    EmbeddingCountMismatch { expected: usize, got: usize },

    #[error("embedding request timed out after {}s", .0.as_secs())]
    EmbeddingTimeout(std::time::Duration),

    #[error("embedding failed: {0}")]
    Embedding(#[from] docent_llm::LlmError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
