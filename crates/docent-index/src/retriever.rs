use std::sync::Arc;
use std::time::Duration;

use docent_llm::LlmProvider;

use crate::document::PageMetadata;
use crate::error::IndexError;
use crate::vector_store::VectorIndex;

/// Citation for one page that contributed to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    pub source: String,
    pub page: usize,
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (page {})", self.source, self.page)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub metadata: PageMetadata,
    pub score: f32,
}

/// Passages for one query, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedContext {
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievedContext {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Distinct `(source, page)` pairs in first-seen order.
    #[must_use]
    pub fn sources(&self) -> Vec<SourceRef> {
        let mut seen = std::collections::HashSet::new();
        self.chunks
            .iter()
            .map(|c| SourceRef {
                source: c.metadata.source.clone(),
                page: c.metadata.page,
            })
            .filter(|s| seen.insert(s.clone()))
            .collect()
    }
}

/// Embeds queries and searches a read-only index.
pub struct Retriever<P: LlmProvider> {
    index: Arc<dyn VectorIndex>,
    provider: Arc<P>,
    embed_timeout: Option<Duration>,
}

impl<P: LlmProvider> Retriever<P> {
    /// # Errors
    ///
    /// Returns [`IndexError::EmbeddingSchemeMismatch`] if the provider's
    /// embedding model is not the one the index was built with.
    pub fn new(index: Arc<dyn VectorIndex>, provider: Arc<P>) -> Result<Self, IndexError> {
        let scheme = index.scheme();
        if provider.embedding_model() != scheme.model {
            return Err(IndexError::EmbeddingSchemeMismatch {
                expected: scheme.to_string(),
                actual: provider.embedding_model().to_owned(),
            });
        }
        Ok(Self {
            index,
            provider,
            embed_timeout: None,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Return at most `k` chunks scoring at least `score_threshold`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded, the query vector does
    /// not match the index dimension, or the search fails.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        score_threshold: f32,
    ) -> Result<RetrievedContext, IndexError> {
        if k == 0 {
            return Ok(RetrievedContext::default());
        }

        let vector = match self.embed_timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.embed(query))
                .await
                .map_err(|_| IndexError::EmbeddingTimeout(limit))??,
            None => self.provider.embed(query).await?,
        };

        let scheme = self.index.scheme();
        if vector.len() != scheme.dimension {
            return Err(IndexError::EmbeddingSchemeMismatch {
                expected: scheme.to_string(),
                actual: format!("{} ({} dims)", self.provider.embedding_model(), vector.len()),
            });
        }

        let hits = self.index.query(vector, k).await?;
        let total = hits.len();
        let chunks: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter(|hit| hit.score >= score_threshold)
            .map(|hit| RetrievedChunk {
                content: hit.content,
                metadata: hit.metadata,
                score: hit.score,
            })
            .collect();

        tracing::debug!(
            candidates = total,
            kept = chunks.len(),
            threshold = score_threshold,
            scores = ?chunks.iter().map(|c| c.score).collect::<Vec<_>>(),
            "retrieved context"
        );

        Ok(RetrievedContext { chunks })
    }
}

#[cfg(test)]
mod tests {
    use docent_llm::mock::MockProvider;

    use super::*;
    use crate::local_store::LocalVectorIndex;
    use crate::vector_store::{EmbeddingScheme, IndexEntry};

    fn meta(source: &str, page: usize) -> PageMetadata {
        PageMetadata {
            source: source.into(),
            content_type: "application/pdf".into(),
            page,
        }
    }

    async fn index_with(entries: Vec<(&str, Vec<f32>, PageMetadata)>) -> Arc<dyn VectorIndex> {
        let dimension = entries.first().map_or(2, |e| e.1.len());
        let index = LocalVectorIndex::new(EmbeddingScheme {
            model: "mock-embed".into(),
            dimension,
        });
        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(i, (content, vector, metadata))| IndexEntry {
                id: i.to_string(),
                vector,
                content: content.into(),
                metadata,
            })
            .collect();
        index.upsert(entries).await.unwrap();
        Arc::new(index)
    }

    fn provider(query_vector: Vec<f32>) -> Arc<MockProvider> {
        Arc::new(MockProvider::default().with_embedding(query_vector))
    }

    #[tokio::test]
    async fn filters_by_threshold_and_orders_by_score() {
        let index = index_with(vec![
            ("orthogonal", vec![0.0, 1.0], meta("a.pdf", 1)),
            ("exact", vec![1.0, 0.0], meta("a.pdf", 2)),
            ("close", vec![0.9, 0.3], meta("b.pdf", 1)),
        ])
        .await;
        let retriever = Retriever::new(index, provider(vec![1.0, 0.0])).unwrap();

        let ctx = retriever.retrieve("q", 10, 0.2).await.unwrap();
        let contents: Vec<_> = ctx.chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["exact", "close"]);
        assert!(ctx.chunks.iter().all(|c| c.score >= 0.2));
        assert!(ctx.chunks[0].score >= ctx.chunks[1].score);
    }

    #[tokio::test]
    async fn bounded_by_k() {
        let index = index_with(vec![
            ("one", vec![1.0, 0.0], meta("a.pdf", 1)),
            ("two", vec![0.9, 0.1], meta("a.pdf", 2)),
            ("three", vec![0.8, 0.2], meta("a.pdf", 3)),
        ])
        .await;
        let retriever = Retriever::new(index, provider(vec![1.0, 0.0])).unwrap();

        assert_eq!(retriever.retrieve("q", 2, -1.0).await.unwrap().len(), 2);
        assert!(retriever.retrieve("q", 0, -1.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn threshold_above_every_score_yields_empty_context() {
        let index = index_with(vec![("one", vec![0.5, 0.5], meta("a.pdf", 1))]).await;
        let retriever = Retriever::new(index, provider(vec![1.0, 0.0])).unwrap();

        let ctx = retriever.retrieve("q", 10, 0.99).await.unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn empty_index_yields_empty_context() {
        let index: Arc<dyn VectorIndex> = Arc::new(LocalVectorIndex::new(EmbeddingScheme {
            model: "mock-embed".into(),
            dimension: 2,
        }));
        let retriever = Retriever::new(index, provider(vec![1.0, 0.0])).unwrap();
        assert!(retriever.retrieve("q", 5, 0.0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn model_mismatch_rejected_at_construction() {
        let index = index_with(vec![("one", vec![1.0, 0.0], meta("a.pdf", 1))]).await;
        let other = Arc::new(
            MockProvider::default()
                .with_embedding(vec![1.0, 0.0])
                .with_embedding_model("other-model"),
        );
        assert!(matches!(
            Retriever::new(index, other),
            Err(IndexError::EmbeddingSchemeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected_per_query() {
        let index = index_with(vec![("one", vec![1.0, 0.0], meta("a.pdf", 1))]).await;
        let retriever = Retriever::new(index, provider(vec![1.0, 0.0, 0.0])).unwrap();
        assert!(matches!(
            retriever.retrieve("q", 5, 0.0).await,
            Err(IndexError::EmbeddingSchemeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn embedding_failure_propagates() {
        let index = index_with(vec![("one", vec![1.0, 0.0], meta("a.pdf", 1))]).await;
        let mut failing = MockProvider::default().with_embedding(vec![1.0, 0.0]);
        failing.fail_embed = true;
        let retriever = Retriever::new(index, Arc::new(failing)).unwrap();
        assert!(matches!(
            retriever.retrieve("q", 5, 0.0).await,
            Err(IndexError::Embedding(_))
        ));
    }

    #[test]
    fn sources_are_deduplicated_in_order() {
        let chunk = |source: &str, page| RetrievedChunk {
            content: String::new(),
            metadata: meta(source, page),
            score: 0.5,
        };
        let ctx = RetrievedContext {
            chunks: vec![chunk("b.pdf", 2), chunk("a.pdf", 1), chunk("b.pdf", 2), chunk("b.pdf", 3)],
        };
        let sources: Vec<String> = ctx.sources().iter().map(ToString::to_string).collect();
        assert_eq!(sources, vec!["b.pdf (page 2)", "a.pdf (page 1)", "b.pdf (page 3)"]);
    }
}
