use std::path::Path;
use std::pin::Pin;

use super::super::{
    DEFAULT_MAX_FILE_SIZE, DocumentError, DocumentLoader, Page, PageMetadata, SourceDocument,
};

/// Extracts per-page text from PDF files.
pub struct PdfLoader {
    pub max_file_size: u64,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for PdfLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Page>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let doc = SourceDocument::read(&path, max_size).await?;
            let source = doc.source();

            let bytes = doc.bytes;
            let extracted = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem_by_pages(&bytes)
            })
            .await
            // pdf-extract panics on some malformed inputs; the join error carries it.
            .map_err(|e| DocumentError::Unreadable {
                path: source.clone(),
                reason: format!("extraction aborted: {e}"),
            })?
            .map_err(|e| DocumentError::Unreadable {
                path: source.clone(),
                reason: e.to_string(),
            })?;

            Ok(extracted
                .into_iter()
                .enumerate()
                .map(|(i, content)| Page {
                    content,
                    metadata: PageMetadata {
                        source: source.clone(),
                        content_type: "application/pdf".to_owned(),
                        page: i + 1,
                    },
                })
                .collect())
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}
