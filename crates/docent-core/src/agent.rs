use std::fmt::Write;

use docent_index::SourceRef;
use docent_llm::LlmProvider;
use tokio::sync::watch;

use crate::channel::{Channel, ChannelError};
use crate::session::{ChatSession, TurnOutcome};

/// Shown once when the chat starts. Not part of the conversation history.
pub const GREETING: &str = "Hi there, how can I help you?";

/// Interactive loop feeding channel messages through a [`ChatSession`].
pub struct Agent<P: LlmProvider, C: Channel> {
    session: ChatSession<P>,
    channel: C,
    shutdown: watch::Receiver<bool>,
}

impl<P: LlmProvider, C: Channel> Agent<P, C> {
    #[must_use]
    pub fn new(session: ChatSession<P>, channel: C) -> Self {
        let (_tx, rx) = watch::channel(false);
        Self {
            session,
            channel,
            shutdown: rx,
        }
    }

    #[must_use]
    pub fn with_shutdown(mut self, rx: watch::Receiver<bool>) -> Self {
        self.shutdown = rx;
        self
    }

    #[must_use]
    pub fn session(&self) -> &ChatSession<P> {
        &self.session
    }

    /// Run the chat loop until EOF or shutdown.
    ///
    /// Failed turns are reported to the user and the loop continues.
    ///
    /// # Errors
    ///
    /// Returns an error only if channel I/O fails.
    pub async fn run(&mut self) -> Result<(), ChannelError> {
        self.channel.send(GREETING).await?;

        loop {
            self.session.await_input();
            let incoming = tokio::select! {
                result = self.channel.recv() => result?,
                () = shutdown_signal(&mut self.shutdown) => {
                    tracing::info!("shutting down");
                    break;
                }
            };
            let Some(msg) = incoming else { break };

            let text = msg.text.trim();
            if text.is_empty() {
                continue;
            }

            self.channel.send_status("Searching documents...").await?;
            let reply = match self.session.handle_turn(text).await {
                TurnOutcome::Answered { answer, sources } => format_answer(&answer, &sources),
                TurnOutcome::Failed { message } => format!("Error: {message}"),
            };
            self.channel.send_status("").await?;
            self.channel.send(&reply).await?;
            self.session.clear_error();
        }

        Ok(())
    }
}

fn format_answer(answer: &str, sources: &[SourceRef]) -> String {
    let mut out = answer.trim_end().to_owned();
    if !sources.is_empty() {
        out.push_str("\n\nSources:");
        for source in sources {
            let _ = write!(out, "\n  - {source}");
        }
    }
    out
}

async fn shutdown_signal(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
