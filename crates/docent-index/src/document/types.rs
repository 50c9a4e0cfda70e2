use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::DocumentError;

/// Where a piece of text came from. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub source: String,
    pub content_type: String,
    pub page: usize,
}

/// One logical unit of a source file, e.g. one PDF page.
#[derive(Debug, Clone)]
pub struct Page {
    pub content: String,
    pub metadata: PageMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub metadata: PageMetadata,
    /// Position of this chunk within its page.
    pub chunk_index: usize,
}

/// Raw bytes of one input file, held only until pages are extracted.
#[derive(Debug)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub extension: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    /// Read a file, rejecting it when it exceeds `max_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is too large.
    pub async fn read(path: &Path, max_size: u64) -> Result<Self, DocumentError> {
        let path = tokio::fs::canonicalize(path).await?;

        let meta = tokio::fs::metadata(&path).await?;
        if meta.len() > max_size {
            return Err(DocumentError::FileTooLarge(meta.len()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let bytes = tokio::fs::read(&path).await?;

        Ok(Self {
            path,
            extension,
            bytes,
        })
    }

    #[must_use]
    pub fn source(&self) -> String {
        self.path.display().to_string()
    }
}
