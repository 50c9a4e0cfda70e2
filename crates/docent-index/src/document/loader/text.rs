use std::path::Path;
use std::pin::Pin;

use super::super::{
    DEFAULT_MAX_FILE_SIZE, DocumentError, DocumentLoader, Page, PageMetadata, SourceDocument,
};

/// Form feed, the conventional page separator in plain-text exports.
const PAGE_BREAK: char = '\u{c}';

/// Loads UTF-8 text files. Form feeds split the file into pages.
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for TextLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Page>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let doc = SourceDocument::read(&path, max_size).await?;

            let content_type = match doc.extension.as_str() {
                "md" | "markdown" => "text/markdown",
                _ => "text/plain",
            };
            let source = doc.source();

            let text = String::from_utf8(doc.bytes).map_err(|e| DocumentError::Unreadable {
                path: source.clone(),
                reason: e.to_string(),
            })?;

            Ok(text
                .split(PAGE_BREAK)
                .enumerate()
                .map(|(i, content)| Page {
                    content: content.to_owned(),
                    metadata: PageMetadata {
                        source: source.clone(),
                        content_type: content_type.to_owned(),
                        page: i + 1,
                    },
                })
                .collect())
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md", "markdown"]
    }
}
