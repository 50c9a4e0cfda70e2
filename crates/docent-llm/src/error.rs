#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: String },

    #[error("chat request failed: {0}")]
    Chat(String),

    #[error("embedding request failed: {0}")]
    Embedding(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
