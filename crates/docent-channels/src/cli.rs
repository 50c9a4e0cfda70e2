use std::io::{self, BufRead, Write};

use docent_core::channel::{Channel, ChannelError, ChannelMessage};

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Message(String),
    Blank,
    Quit,
}

fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Input::Blank
    } else if trimmed == "exit" || trimmed == "quit" {
        Input::Quit
    } else {
        Input::Message(trimmed.to_owned())
    }
}

/// Reads one line from stdin after printing the prompt. `None` on EOF.
fn read_line(prompt: &str) -> io::Result<Option<String>> {
    let mut out = io::stdout().lock();
    write!(out, "{prompt}")?;
    out.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// CLI channel that reads from stdin and writes to stdout.
#[derive(Debug, Default)]
pub struct CliChannel {
    turns: usize,
}

impl CliChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Channel for CliChannel {
    async fn recv(&mut self) -> Result<Option<ChannelMessage>, ChannelError> {
        loop {
            let line = tokio::task::spawn_blocking(|| read_line("You: "))
                .await
                .map_err(|e| ChannelError::Other(e.to_string()))?
                .map_err(ChannelError::Io)?;

            let Some(line) = line else {
                println!();
                return Ok(None);
            };

            match parse_input(&line) {
                Input::Blank => {}
                Input::Quit => return Ok(None),
                Input::Message(text) => {
                    self.turns += 1;
                    tracing::debug!(turn = self.turns, "received user message");
                    return Ok(Some(ChannelMessage { text }));
                }
            }
        }
    }

    async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        println!("Docent: {text}\n");
        Ok(())
    }

    async fn send_status(&mut self, text: &str) -> Result<(), ChannelError> {
        if !text.is_empty() {
            let mut err = io::stderr().lock();
            writeln!(err, "({text})")?;
        }
        Ok(())
    }
}
