pub mod error;
pub mod loader;
pub mod pipeline;
pub mod splitter;
pub mod types;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

pub use error::DocumentError;
pub use loader::TextLoader;
pub use pipeline::{
    FileFailure, IngestionConfig, IngestionPipeline, IngestionReport, discover_files,
};
pub use splitter::{Chunks, SplitterConfig, TextSplitter};
pub use types::{Chunk, Page, PageMetadata, SourceDocument};

#[cfg(feature = "pdf")]
pub use loader::PdfLoader;

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

pub trait DocumentLoader: Send + Sync {
    /// Extract the pages of one file, in page order.
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Page>, DocumentError>> + Send + '_>>;

    fn supported_extensions(&self) -> &[&str];
}
