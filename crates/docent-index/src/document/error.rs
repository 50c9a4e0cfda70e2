#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    /// Corrupt or undecodable input.
    #[error("unreadable document {path}: {reason}")]
    Unreadable { path: String, reason: String },
}
