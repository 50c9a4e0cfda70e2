use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use docent_llm::{LlmError, LlmProvider};
use futures::{StreamExt, TryStreamExt, stream};
use uuid::Uuid;

use super::{Chunk, DocumentLoader, Page, TextSplitter};
use crate::error::IndexError;
use crate::local_store::LocalVectorIndex;
use crate::vector_store::{EmbeddingScheme, IndexEntry, VectorIndex};

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Chunks per embedding request.
    pub embed_batch_size: usize,
    /// Files extracted concurrently.
    pub parallel_files: usize,
    /// Embedding requests in flight at once.
    pub parallel_batches: usize,
    pub embed_timeout: Option<Duration>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            embed_batch_size: 32,
            parallel_files: 4,
            parallel_batches: 2,
            embed_timeout: None,
        }
    }
}

/// A file skipped during ingestion.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestionReport {
    pub files_discovered: usize,
    pub files_failed: usize,
    pub failures: Vec<FileFailure>,
    pub pages_extracted: usize,
    pub chunks_produced: usize,
    pub entries_written: usize,
    /// `false` when nothing was indexed and the previous index was left alone.
    pub index_written: bool,
}

/// Offline pipeline: discover -> load -> split -> embed -> persist.
pub struct IngestionPipeline<P: LlmProvider> {
    splitter: TextSplitter,
    loader: Box<dyn DocumentLoader>,
    provider: Arc<P>,
    index_location: PathBuf,
    config: IngestionConfig,
}

impl<P: LlmProvider> IngestionPipeline<P> {
    pub fn new(
        splitter: TextSplitter,
        loader: Box<dyn DocumentLoader>,
        provider: Arc<P>,
        index_location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            splitter,
            loader,
            provider,
            index_location: index_location.into(),
            config: IngestionConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: IngestionConfig) -> Self {
        self.config = config;
        self
    }

    /// Ingest every matching file in `folder` and replace the index with the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder is missing or holds no matching files,
    /// if embedding fails, or if the index cannot be written. Files that fail
    /// to load are recorded in the report instead.
    pub async fn ingest(&self, folder: &Path, extension: &str) -> Result<IngestionReport, IndexError> {
        if self.config.embed_batch_size == 0 {
            return Err(IndexError::Config("embed_batch_size must be greater than 0".into()));
        }
        if !self.provider.supports_embeddings() {
            return Err(IndexError::Embedding(LlmError::EmbedUnsupported {
                provider: self.provider.name().to_owned(),
            }));
        }

        let files = discover_files(folder, extension).await?;
        let mut report = IngestionReport {
            files_discovered: files.len(),
            ..IngestionReport::default()
        };
        tracing::info!(
            folder = %folder.display(),
            files = files.len(),
            "starting ingestion"
        );

        let pages = self.load_all(&files, &mut report).await;
        report.pages_extracted = pages.len();

        let chunks: Vec<Chunk> = pages
            .iter()
            .flat_map(|page| self.splitter.chunks(page))
            .collect();
        report.chunks_produced = chunks.len();
        tracing::info!(
            pages = report.pages_extracted,
            chunks = report.chunks_produced,
            "split documents"
        );

        if chunks.is_empty() {
            tracing::warn!("no text extracted, leaving existing index untouched");
            return Ok(report);
        }

        let vectors = self.embed_all(&chunks).await?;
        let dimension = vectors[0].len();
        if let Some(odd) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(IndexError::EmbeddingSchemeMismatch {
                expected: format!("{dimension} dims"),
                actual: format!("{} dims", odd.len()),
            });
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry {
                id: entry_id(&chunk),
                vector,
                content: chunk.content,
                metadata: chunk.metadata,
            })
            .collect();
        report.entries_written = entries.len();

        let index = LocalVectorIndex::new(EmbeddingScheme {
            model: self.provider.embedding_model().to_owned(),
            dimension,
        });
        index.upsert(entries).await?;
        index.persist(&self.index_location).await?;
        report.index_written = true;

        tracing::info!(
            entries = report.entries_written,
            failed_files = report.files_failed,
            location = %self.index_location.display(),
            "index written"
        );
        Ok(report)
    }

    async fn load_all(&self, files: &[PathBuf], report: &mut IngestionReport) -> Vec<Page> {
        let loaded: Vec<_> = stream::iter(files)
            .map(|path| async move { (path, self.loader.load(path).await) })
            .buffered(self.config.parallel_files.max(1))
            .collect()
            .await;

        let mut pages = Vec::new();
        for (n, (path, result)) in loaded.into_iter().enumerate() {
            match result {
                Ok(file_pages) => {
                    tracing::info!(
                        path = %path.display(),
                        "file #{} contains {} pages",
                        n + 1,
                        file_pages.len()
                    );
                    pages.extend(file_pages);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping file: {e}");
                    report.failures.push(FileFailure {
                        path: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        report.files_failed = report.failures.len();
        pages
    }

    async fn embed_all(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, IndexError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(self.config.embed_batch_size))
            .map(|batch| self.embed_batch(batch))
            .buffered(self.config.parallel_batches.max(1))
            .try_collect()
            .await?;
        Ok(batches.into_iter().flatten().collect())
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let vectors = match self.config.embed_timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.embed_batch(batch))
                .await
                .map_err(|_| IndexError::EmbeddingTimeout(limit))??,
            None => self.provider.embed_batch(batch).await?,
        };
        if vectors.len() != batch.len() {
            return Err(IndexError::EmbeddingCountMismatch {
                expected: batch.len(),
                got: vectors.len(),
            });
        }
        tracing::debug!(size = batch.len(), "embedded batch");
        Ok(vectors)
    }
}

/// Stable id for a chunk, so re-ingesting the same file yields the same ids.
fn entry_id(chunk: &Chunk) -> String {
    let key = format!(
        "{}/{}/{}",
        chunk.metadata.source, chunk.metadata.page, chunk.chunk_index
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

/// Regular files directly inside `folder` whose extension matches
/// (case-insensitive, leading dot ignored), sorted by file name.
///
/// # Errors
///
/// Returns [`IndexError::SourceFolderMissing`] if `folder` is not a readable
/// directory and [`IndexError::NoSourceFiles`] if nothing matches.
pub async fn discover_files(folder: &Path, extension: &str) -> Result<Vec<PathBuf>, IndexError> {
    let wanted = extension.trim_start_matches('.');
    let mut dir = tokio::fs::read_dir(folder)
        .await
        .map_err(|_| IndexError::SourceFolderMissing(folder.to_path_buf()))?;

    let mut files = Vec::new();
    while let Some(entry) = dir
        .next_entry()
        .await
        .map_err(super::DocumentError::Io)?
    {
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(wanted));
        if !matches {
            continue;
        }
        let is_file = tokio::fs::metadata(&path)
            .await
            .is_ok_and(|m| m.is_file());
        if is_file {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(IndexError::NoSourceFiles {
            folder: folder.to_path_buf(),
            extension: wanted.to_owned(),
        });
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
