//! Test-only mock provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::LlmError;
use crate::provider::{ChatOptions, LlmProvider, Message};

/// Dimension of [`bag_of_words_embedding`] vectors.
pub const BAG_OF_WORDS_DIM: usize = 256;

/// Deterministic embedding: lowercase alphanumeric tokens hashed into
/// [`BAG_OF_WORDS_DIM`] buckets. Texts sharing words get positive cosine similarity.
#[must_use]
pub fn bag_of_words_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; BAG_OF_WORDS_DIM];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let lower = token.to_lowercase();
        let hash = blake3::hash(lower.as_bytes());
        let bytes = hash.as_bytes();
        let bucket = usize::from(u16::from_le_bytes([bytes[0], bytes[1]])) % BAG_OF_WORDS_DIM;
        vector[bucket] += 1.0;
    }
    vector
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<Vec<Message>>>>,
    calls: Arc<AtomicUsize>,
    pub default_response: String,
    pub embedding: Vec<f32>,
    pub embed_fn: Option<fn(&str) -> Vec<f32>>,
    pub embedding_model: String,
    pub supports_embeddings: bool,
    pub fail_chat: bool,
    pub fail_embed: bool,
    /// Chat calls with index >= this value fail (0-based).
    pub fail_chat_from: Option<usize>,
    /// Milliseconds to sleep before returning a chat response.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            default_response: "mock response".into(),
            embedding: vec![0.0; 8],
            embed_fn: None,
            embedding_model: "mock-embed".into(),
            supports_embeddings: false,
            fail_chat: false,
            fail_embed: false,
            fail_chat_from: None,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    /// Embeds with [`bag_of_words_embedding`].
    #[must_use]
    pub fn with_bag_of_words(mut self) -> Self {
        self.supports_embeddings = true;
        self.embed_fn = Some(bag_of_words_embedding);
        self.embedding_model = "mock-bag-of-words".into();
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.supports_embeddings = true;
        self.embedding = embedding;
        self
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    #[must_use]
    pub fn failing_from_call(mut self, index: usize) -> Self {
        self.fail_chat_from = Some(index);
        self
    }

    /// Messages received by each chat call so far.
    #[must_use]
    pub fn received(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().unwrap().clone()
    }

    #[must_use]
    pub fn chat_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message], _options: &ChatOptions) -> Result<String, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(messages.to_vec());
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_chat || self.fail_chat_from.is_some_and(|from| call >= from) {
            return Err(LlmError::Chat("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.fail_embed {
            return Err(LlmError::Embedding("mock embed error".into()));
        }
        if !self.supports_embeddings {
            return Err(LlmError::EmbedUnsupported {
                provider: "mock".into(),
            });
        }
        Ok(match self.embed_fn {
            Some(f) => f(text),
            None => self.embedding.clone(),
        })
    }

    fn supports_embeddings(&self) -> bool {
        self.supports_embeddings
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
