//! One user's conversation: retrieval, prompting and generation per turn.

use std::sync::Arc;

use docent_index::{IndexError, Retriever, SourceRef};
use docent_llm::LlmProvider;

use crate::generator::{AnswerGenerator, GenerationError};
use crate::history::{ConversationHistory, ConversationTurn};
use crate::prompt::build_prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingInput,
    Retrieving,
    Generating,
    /// The last turn failed and the error has not been shown yet.
    Error,
}

#[derive(Debug, Clone, Copy)]
pub struct RetrievalSettings {
    pub k: usize,
    pub score_threshold: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            k: 10,
            score_threshold: 0.2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] IndexError),
    #[error("{0}")]
    Generation(#[from] GenerationError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Answered {
        answer: String,
        sources: Vec<SourceRef>,
    },
    Failed {
        message: String,
    },
}

pub struct ChatSession<P: LlmProvider> {
    retriever: Arc<Retriever<P>>,
    generator: Arc<AnswerGenerator<P>>,
    retrieval: RetrievalSettings,
    history: ConversationHistory,
    state: SessionState,
}

impl<P: LlmProvider> ChatSession<P> {
    #[must_use]
    pub fn new(
        retriever: Arc<Retriever<P>>,
        generator: Arc<AnswerGenerator<P>>,
        retrieval: RetrievalSettings,
    ) -> Self {
        Self {
            retriever,
            generator,
            retrieval,
            history: ConversationHistory::new(),
            state: SessionState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Mark the session as waiting for the next message.
    pub fn await_input(&mut self) {
        self.state = SessionState::AwaitingInput;
    }

    /// Return to `Idle` once a failed turn has been shown to the user.
    pub fn clear_error(&mut self) {
        if self.state == SessionState::Error {
            self.state = SessionState::Idle;
        }
    }

    /// Answer one user message.
    ///
    /// Always appends exactly two turns: the user message, then either the
    /// answer or an error turn. Failures are reported in the outcome and never
    /// returned as `Err`.
    pub async fn handle_turn(&mut self, message: &str) -> TurnOutcome {
        self.history.push(ConversationTurn::user(message));

        match self.answer(message).await {
            Ok((answer, sources)) => {
                self.history
                    .push(ConversationTurn::assistant(answer.clone(), sources.clone()));
                self.state = SessionState::Idle;
                TurnOutcome::Answered { answer, sources }
            }
            Err(e) => {
                tracing::error!("turn failed: {e:#}");
                let message = e.to_string();
                self.history.push(ConversationTurn::error(message.clone()));
                self.state = SessionState::Error;
                TurnOutcome::Failed { message }
            }
        }
    }

    async fn answer(&mut self, message: &str) -> Result<(String, Vec<SourceRef>), TurnError> {
        self.state = SessionState::Retrieving;
        let context = self
            .retriever
            .retrieve(message, self.retrieval.k, self.retrieval.score_threshold)
            .await?;
        let sources = context.sources();
        for source in &sources {
            tracing::info!("source: {source}");
        }
        if context.is_empty() {
            tracing::info!("no passage passed the score threshold");
        }

        self.state = SessionState::Generating;
        let prompt = build_prompt(message, &context);
        let answer = self.generator.generate(&prompt).await?;
        Ok((answer, sources))
    }
}

#[cfg(test)]
mod tests {
    use docent_index::document::PageMetadata;
    use docent_index::{EmbeddingScheme, IndexEntry, LocalVectorIndex, VectorIndex};
    use docent_llm::Role;
    use docent_llm::mock::{MockProvider, bag_of_words_embedding, BAG_OF_WORDS_DIM};

    use super::*;
    use crate::generator::GenerationSettings;
    use crate::history::TurnStatus;

    async fn session(provider: MockProvider) -> ChatSession<MockProvider> {
        let index = LocalVectorIndex::new(EmbeddingScheme {
            model: provider.embedding_model().to_owned(),
            dimension: BAG_OF_WORDS_DIM,
        });
        let text = "The warranty period is 12 months from delivery.";
        index
            .upsert(vec![IndexEntry {
                id: "w".into(),
                vector: bag_of_words_embedding(text),
                content: text.into(),
                metadata: PageMetadata {
                    source: "manual.pdf".into(),
                    content_type: "application/pdf".into(),
                    page: 1,
                },
            }])
            .await
            .unwrap();

        let provider = Arc::new(provider);
        let retriever = Retriever::new(Arc::new(index), Arc::clone(&provider)).unwrap();
        let generator = AnswerGenerator::new(provider, GenerationSettings::default());
        ChatSession::new(
            Arc::new(retriever),
            Arc::new(generator),
            RetrievalSettings::default(),
        )
    }

    #[tokio::test]
    async fn answered_turn_appends_user_and_assistant() {
        let provider =
            MockProvider::with_responses(vec!["12 months.".into()]).with_bag_of_words();
        let mut session = session(provider).await;

        let outcome = session.handle_turn("How long is the warranty?").await;
        let TurnOutcome::Answered { answer, sources } = outcome else {
            panic!("expected an answer");
        };
        assert_eq!(answer, "12 months.");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].page, 1);

        let turns = session.history().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].sources, sources);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn failed_generation_appends_error_turn() {
        let provider = MockProvider::with_responses(vec!["First answer.".into()])
            .with_bag_of_words()
            .failing_from_call(1);
        let mut session = session(provider).await;

        let first = session.handle_turn("How long is the warranty?").await;
        assert!(matches!(first, TurnOutcome::Answered { .. }));

        let second = session.handle_turn("And the delivery time?").await;
        assert!(matches!(second, TurnOutcome::Failed { .. }));

        let turns = session.history().turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[2].role, Role::User);
        assert_eq!(turns[3].role, Role::Assistant);
        assert_eq!(turns[3].status, TurnStatus::Error);
        assert!(!turns[3].content.is_empty());
        assert_eq!(session.state(), SessionState::Error);

        session.clear_error();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn clear_error_leaves_other_states_alone() {
        let provider = MockProvider::default().with_bag_of_words();
        let mut session = session(provider).await;
        session.await_input();
        session.clear_error();
        assert_eq!(session.state(), SessionState::AwaitingInput);
    }

    #[tokio::test]
    async fn retrieval_failure_is_a_failed_turn() {
        let mut provider = MockProvider::default().with_bag_of_words();
        let mut session = session(provider.clone()).await;
        provider.fail_embed = true;
        let failing = Arc::new(provider);
        let index = Arc::clone(session.retriever.index());
        session.retriever =
            Arc::new(Retriever::new(index, Arc::clone(&failing)).unwrap());

        let outcome = session.handle_turn("anything").await;
        let TurnOutcome::Failed { message } = outcome else {
            panic!("expected failure");
        };
        assert!(message.contains("retrieval failed"));
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn unrelated_question_still_answers_without_sources() {
        let provider = MockProvider::with_responses(vec!["I don't know.".into()])
            .with_bag_of_words();
        let mut session = session(provider.clone()).await;

        let outcome = session.handle_turn("zebra xylophone").await;
        let TurnOutcome::Answered { sources, .. } = outcome else {
            panic!("expected an answer");
        };
        assert!(sources.is_empty());
        let prompt = &provider.received()[0][0].content;
        assert!(prompt.contains(crate::prompt::NO_CONTEXT_MARKER));
    }
}
