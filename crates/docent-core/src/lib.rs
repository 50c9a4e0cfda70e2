//! Query-time pipeline for docent: configuration, prompt building, answer
//! generation, chat sessions and the interactive loop.

pub mod agent;
pub mod channel;
pub mod config;
pub mod generator;
pub mod history;
pub mod prompt;
pub mod session;

pub use agent::{Agent, GREETING};
pub use channel::{Channel, ChannelError, ChannelMessage};
pub use config::Config;
pub use generator::{AnswerGenerator, GenerationError, GenerationSettings};
pub use history::{ConversationHistory, ConversationTurn, TurnStatus};
pub use prompt::{NO_CONTEXT_MARKER, build_prompt};
pub use session::{ChatSession, RetrievalSettings, SessionState, TurnOutcome};
