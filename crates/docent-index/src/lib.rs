//! Document ingestion and retrieval: loaders turn files into pages, the
//! splitter turns pages into overlapping chunks, the ingestion pipeline embeds
//! and persists them into a [`LocalVectorIndex`], and the [`Retriever`] serves
//! threshold-filtered top-k context at query time.

pub mod document;
pub mod error;
pub mod local_store;
pub mod retriever;
pub mod vector_store;

pub use error::{IndexError, Result};
pub use local_store::LocalVectorIndex;
pub use retriever::{RetrievedChunk, RetrievedContext, Retriever, SourceRef};
pub use vector_store::{EmbeddingScheme, IndexEntry, ScoredEntry, VectorIndex, VectorStoreError};
