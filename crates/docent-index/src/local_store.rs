//! File-backed vector index with exact cosine search.
//!
//! The whole index lives in memory and is written as one JSON document,
//! `<location>/index.json`. Writes go to a temporary file in the same
//! directory which is then renamed over the old one, so readers only ever
//! see a complete index.

use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::vector_store::{EmbeddingScheme, IndexEntry, ScoredEntry, VectorIndex, VectorStoreError};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const INDEX_FILE_NAME: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct IndexFileRef<'a> {
    version: u32,
    scheme: &'a EmbeddingScheme,
    entries: &'a [IndexEntry],
}

#[derive(Deserialize)]
struct IndexFile {
    version: u32,
    scheme: EmbeddingScheme,
    entries: Vec<IndexEntry>,
}

#[derive(Default)]
struct Entries {
    items: Vec<IndexEntry>,
    positions: HashMap<String, usize>,
}

pub struct LocalVectorIndex {
    scheme: EmbeddingScheme,
    entries: RwLock<Entries>,
}

impl std::fmt::Debug for LocalVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalVectorIndex")
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl LocalVectorIndex {
    #[must_use]
    pub fn new(scheme: EmbeddingScheme) -> Self {
        Self {
            scheme,
            entries: RwLock::new(Entries::default()),
        }
    }

    #[must_use]
    pub fn index_file(location: &Path) -> PathBuf {
        location.join(INDEX_FILE_NAME)
    }

    #[must_use]
    pub fn exists(location: &Path) -> bool {
        Self::index_file(location).is_file()
    }

    /// Load a previously persisted index.
    ///
    /// # Errors
    ///
    /// Returns [`VectorStoreError::Load`] if the file cannot be read and
    /// [`VectorStoreError::Corrupt`] if it does not hold a valid index.
    pub async fn load(location: &Path) -> Result<Self, VectorStoreError> {
        let path = Self::index_file(location);
        let path_str = path.display().to_string();

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            let reason = if e.kind() == std::io::ErrorKind::NotFound {
                "no index found, run ingestion first".to_owned()
            } else {
                e.to_string()
            };
            VectorStoreError::Load {
                path: path_str.clone(),
                reason,
            }
        })?;

        let file: IndexFile =
            serde_json::from_slice(&bytes).map_err(|e| VectorStoreError::Corrupt {
                path: path_str.clone(),
                reason: e.to_string(),
            })?;

        if file.version != FORMAT_VERSION {
            return Err(VectorStoreError::Corrupt {
                path: path_str,
                reason: format!(
                    "unsupported format version {} (expected {FORMAT_VERSION})",
                    file.version
                ),
            });
        }
        if let Some(bad) = file
            .entries
            .iter()
            .find(|e| e.vector.len() != file.scheme.dimension)
        {
            return Err(VectorStoreError::Corrupt {
                path: path_str,
                reason: format!(
                    "entry {} has dimension {}, scheme declares {}",
                    bad.id,
                    bad.vector.len(),
                    file.scheme.dimension
                ),
            });
        }

        let mut entries = Entries::default();
        for entry in file.entries {
            insert(&mut entries, entry);
        }
        tracing::debug!(path = %path_str, entries = entries.items.len(), "loaded vector index");

        Ok(Self {
            scheme: file.scheme,
            entries: RwLock::new(entries),
        })
    }
}

fn insert(entries: &mut Entries, entry: IndexEntry) {
    if let Some(&pos) = entries.positions.get(&entry.id) {
        entries.items[pos] = entry;
    } else {
        entries.positions.insert(entry.id.clone(), entries.items.len());
        entries.items.push(entry);
    }
}

impl VectorIndex for LocalVectorIndex {
    fn scheme(&self) -> &EmbeddingScheme {
        &self.scheme
    }

    fn len(&self) -> usize {
        self.entries.read().map_or(0, |e| e.items.len())
    }

    fn upsert(&self, entries: Vec<IndexEntry>) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        Box::pin(async move {
            if let Some(bad) = entries
                .iter()
                .find(|e| e.vector.len() != self.scheme.dimension)
            {
                return Err(VectorStoreError::Dimension {
                    expected: self.scheme.dimension,
                    got: bad.vector.len(),
                });
            }
            let mut stored = self
                .entries
                .write()
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            for entry in entries {
                insert(&mut stored, entry);
            }
            Ok(())
        })
    }

    fn query(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredEntry>, VectorStoreError>> {
        Box::pin(async move {
            if vector.len() != self.scheme.dimension {
                return Err(VectorStoreError::Dimension {
                    expected: self.scheme.dimension,
                    got: vector.len(),
                });
            }
            let stored = self
                .entries
                .read()
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            let mut scored: Vec<(f32, &IndexEntry)> = stored
                .items
                .iter()
                .map(|entry| {
                    let score = cosine_similarity(&vector, &entry.vector);
                    (if score.is_nan() { f32::NEG_INFINITY } else { score }, entry)
                })
                .collect();

            // `sort_by` is stable, so ties stay in insertion order.
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            scored.truncate(limit);

            Ok(scored
                .into_iter()
                .map(|(score, entry)| ScoredEntry {
                    id: entry.id.clone(),
                    score,
                    content: entry.content.clone(),
                    metadata: entry.metadata.clone(),
                })
                .collect())
        })
    }

    fn persist<'a>(&'a self, location: &'a Path) -> BoxFuture<'a, Result<(), VectorStoreError>> {
        Box::pin(async move {
            let target = Self::index_file(location);
            let path_str = target.display().to_string();
            let persist_err = |reason: String| VectorStoreError::Persist {
                path: path_str.clone(),
                reason,
            };

            let bytes = {
                let stored = self
                    .entries
                    .read()
                    .map_err(|e| VectorStoreError::Serialization(e.to_string()))?;
                serde_json::to_vec(&IndexFileRef {
                    version: FORMAT_VERSION,
                    scheme: &self.scheme,
                    entries: &stored.items,
                })
                .map_err(|e| VectorStoreError::Serialization(e.to_string()))?
            };

            tokio::fs::create_dir_all(location)
                .await
                .map_err(|e| persist_err(e.to_string()))?;

            let dir = location.to_path_buf();
            let destination = target.clone();
            tokio::task::spawn_blocking(move || -> std::io::Result<()> {
                let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
                tmp.write_all(&bytes)?;
                tmp.as_file().sync_all()?;
                tmp.persist(&destination).map_err(|e| e.error)?;
                Ok(())
            })
            .await
            .map_err(|e| persist_err(e.to_string()))?
            .map_err(|e| persist_err(e.to_string()))?;

            tracing::debug!(path = %path_str, entries = self.len(), "persisted vector index");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PageMetadata;

    fn scheme(dimension: usize) -> EmbeddingScheme {
        EmbeddingScheme {
            model: "test-embed".into(),
            dimension,
        }
    }

    fn entry(id: &str, vector: Vec<f32>, content: &str) -> IndexEntry {
        IndexEntry {
            id: id.into(),
            vector,
            content: content.into(),
            metadata: PageMetadata {
                source: "doc.pdf".into(),
                content_type: "application/pdf".into(),
                page: 1,
            },
        }
    }

    #[tokio::test]
    async fn upsert_and_query_orders_by_similarity() {
        let index = LocalVectorIndex::new(scheme(3));
        index
            .upsert(vec![
                entry("a", vec![1.0, 0.0, 0.0], "x axis"),
                entry("b", vec![0.0, 1.0, 0.0], "y axis"),
                entry("c", vec![0.7, 0.7, 0.0], "diagonal"),
            ])
            .await
            .unwrap();

        let results = index.query(vec![1.0, 0.0, 0.0], 10).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!(results[2].score.abs() < 1e-6);
    }

    #[tokio::test]
    async fn query_respects_limit() {
        let index = LocalVectorIndex::new(scheme(2));
        index
            .upsert(vec![
                entry("a", vec![1.0, 0.0], "a"),
                entry("b", vec![0.9, 0.1], "b"),
                entry("c", vec![0.0, 1.0], "c"),
            ])
            .await
            .unwrap();

        assert_eq!(index.query(vec![1.0, 0.0], 2).await.unwrap().len(), 2);
        assert!(index.query(vec![1.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let index = LocalVectorIndex::new(scheme(2));
        index
            .upsert(vec![
                entry("first", vec![1.0, 0.0], "1"),
                entry("second", vec![2.0, 0.0], "2"),
                entry("third", vec![3.0, 0.0], "3"),
            ])
            .await
            .unwrap();

        let results = index.query(vec![1.0, 0.0], 3).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn nan_scores_rank_last() {
        let index = LocalVectorIndex::new(scheme(2));
        index
            .upsert(vec![
                entry("nan", vec![f32::NAN, 1.0], "broken"),
                entry("a", vec![0.0, 1.0], "a"),
                entry("b", vec![1.0, 0.0], "b"),
                entry("nan2", vec![1.0, f32::NAN], "broken"),
            ])
            .await
            .unwrap();

        let results = index.query(vec![1.0, 0.2], 4).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "nan", "nan2"]);
        assert!(results[3].score.is_infinite() && results[3].score < 0.0);
    }

    #[tokio::test]
    async fn upsert_replaces_same_id_in_place() {
        let index = LocalVectorIndex::new(scheme(2));
        index
            .upsert(vec![entry("a", vec![1.0, 0.0], "old"), entry("b", vec![0.0, 1.0], "b")])
            .await
            .unwrap();
        index
            .upsert(vec![entry("a", vec![1.0, 0.0], "new")])
            .await
            .unwrap();

        assert_eq!(index.len(), 2);
        let results = index.query(vec![1.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].content, "new");
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected() {
        let index = LocalVectorIndex::new(scheme(3));
        let err = index
            .upsert(vec![entry("a", vec![1.0, 0.0], "short")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::Dimension { expected: 3, got: 2 }));

        let err = index.query(vec![1.0], 5).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Dimension { expected: 3, got: 1 }));
    }

    #[test]
    fn cosine_zero_vector_scores_zero() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn persist_then_load_returns_same_results() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("db");

        let index = LocalVectorIndex::new(scheme(2));
        index
            .upsert(vec![
                entry("a", vec![1.0, 0.0], "alpha"),
                entry("b", vec![0.6, 0.8], "beta"),
                entry("c", vec![0.0, 1.0], "gamma"),
            ])
            .await
            .unwrap();
        let before = index.query(vec![0.8, 0.6], 3).await.unwrap();

        index.persist(&location).await.unwrap();
        assert!(LocalVectorIndex::exists(&location));

        let loaded = LocalVectorIndex::load(&location).await.unwrap();
        assert_eq!(loaded.scheme(), index.scheme());
        assert_eq!(loaded.len(), 3);
        let after = loaded.query(vec![0.8, 0.6], 3).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn persist_replaces_previous_index() {
        let dir = tempfile::tempdir().unwrap();

        let first = LocalVectorIndex::new(scheme(2));
        first
            .upsert(vec![entry("a", vec![1.0, 0.0], "a"), entry("b", vec![0.0, 1.0], "b")])
            .await
            .unwrap();
        first.persist(dir.path()).await.unwrap();

        let second = LocalVectorIndex::new(scheme(2));
        second
            .upsert(vec![entry("z", vec![1.0, 1.0], "z")])
            .await
            .unwrap();
        second.persist(dir.path()).await.unwrap();

        let loaded = LocalVectorIndex::load(dir.path()).await.unwrap();
        assert_eq!(loaded.len(), 1);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from(INDEX_FILE_NAME)]);
    }

    #[tokio::test]
    async fn load_missing_index_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalVectorIndex::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Load { .. }));
        assert!(err.to_string().contains("run ingestion first"));
    }

    #[tokio::test]
    async fn load_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE_NAME), b"{ not json").unwrap();
        let err = LocalVectorIndex::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn load_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(INDEX_FILE_NAME),
            br#"{"version":99,"scheme":{"model":"m","dimension":2},"entries":[]}"#,
        )
        .unwrap();
        let err = LocalVectorIndex::load(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("version 99"));
    }

    #[tokio::test]
    async fn load_rejects_entry_with_wrong_dimension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(INDEX_FILE_NAME),
            br#"{"version":1,"scheme":{"model":"m","dimension":2},"entries":[
                {"id":"a","vector":[1.0],"content":"x",
                 "metadata":{"source":"s","content_type":"text/plain","page":1}}]}"#,
        )
        .unwrap();
        let err = LocalVectorIndex::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Corrupt { .. }));
    }
}
