//! Chat and embedding provider abstraction and backend implementations.

pub mod any;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod provider;

pub use any::AnyProvider;
pub use error::LlmError;
pub use provider::{ChatOptions, LlmProvider, Message, Role};
