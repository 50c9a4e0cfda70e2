use std::sync::Arc;
use std::time::Duration;

use docent_llm::{ChatOptions, LlmError, LlmProvider, Message};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("model did not answer within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("prompt needs about {estimated} tokens but the context window is {limit}")]
    ContextWindowExceeded { estimated: usize, limit: usize },

    #[error("model returned an empty answer")]
    EmptyResponse,

    #[error("model backend failed: {0}")]
    Backend(#[from] LlmError),
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub temperature: f32,
    /// Tokens. Prompts estimated above this are rejected before any call.
    pub context_window: usize,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            context_window: 4096,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Rough token count: one token per four characters.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Sends prompts to the language model with fixed sampling settings.
pub struct AnswerGenerator<P: LlmProvider> {
    provider: Arc<P>,
    settings: GenerationSettings,
}

impl<P: LlmProvider> AnswerGenerator<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, settings: GenerationSettings) -> Self {
        Self { provider, settings }
    }

    #[must_use]
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// # Errors
    ///
    /// Returns [`GenerationError`] if the prompt is too large, the backend
    /// fails or times out, or the answer is blank.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let estimated = estimate_tokens(prompt);
        if estimated > self.settings.context_window {
            return Err(GenerationError::ContextWindowExceeded {
                estimated,
                limit: self.settings.context_window,
            });
        }

        let options = ChatOptions {
            temperature: Some(self.settings.temperature),
            context_window: Some(self.settings.context_window),
        };
        let messages = [Message::user(prompt)];

        let answer = tokio::time::timeout(
            self.settings.timeout,
            self.provider.chat(&messages, &options),
        )
        .await
        .map_err(|_| GenerationError::Timeout(self.settings.timeout))??;

        if answer.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        tracing::debug!(
            provider = self.provider.name(),
            prompt_tokens = estimated,
            answer_chars = answer.len(),
            "generated answer"
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use docent_llm::Role;
    use docent_llm::mock::MockProvider;

    use super::*;

    fn generator(provider: MockProvider) -> AnswerGenerator<MockProvider> {
        AnswerGenerator::new(Arc::new(provider), GenerationSettings::default())
    }

    #[tokio::test]
    async fn sends_single_user_message() {
        let provider = MockProvider::with_responses(vec!["The answer.".into()]);
        let generator = generator(provider.clone());

        let answer = generator.generate("the prompt").await.unwrap();
        assert_eq!(answer, "The answer.");

        let received = provider.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].len(), 1);
        assert_eq!(received[0][0].role, Role::User);
        assert_eq!(received[0][0].content, "the prompt");
    }

    #[tokio::test]
    async fn backend_error_maps_to_backend() {
        let err = generator(MockProvider::failing())
            .generate("prompt")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Backend(_)));
    }

    #[tokio::test]
    async fn blank_answer_is_empty_response() {
        let err = generator(MockProvider::with_responses(vec!["  \n".into()]))
            .generate("prompt")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let generator = AnswerGenerator::new(
            Arc::new(MockProvider::default().with_delay(500)),
            GenerationSettings {
                timeout: Duration::from_millis(20),
                ..GenerationSettings::default()
            },
        );
        let err = generator.generate("prompt").await.unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(_)));
    }

    #[tokio::test]
    async fn oversized_prompt_rejected_without_calling_backend() {
        let provider = MockProvider::default();
        let generator = AnswerGenerator::new(
            Arc::new(provider.clone()),
            GenerationSettings {
                context_window: 10,
                ..GenerationSettings::default()
            },
        );
        let err = generator.generate(&"x".repeat(100)).await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::ContextWindowExceeded { estimated: 25, limit: 10 }
        ));
        assert_eq!(provider.chat_calls(), 0);
    }

    #[test]
    fn estimate_tokens_counts_chars() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("éééé"), 1);
    }
}
