//! Interactive console on stdin.

use std::path::PathBuf;

use async_trait::async_trait;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

const PROMPT: &str = "> ";

/// Reads commands with line editing and history.
pub struct ConsoleChannel {
    history: Option<PathBuf>,
}

impl ConsoleChannel {
    pub fn new() -> Self {
        Self { history: None }
    }

    /// Persist history to `path` between runs.
    pub fn with_history(mut self, path: impl Into<PathBuf>) -> Self {
        self.history = Some(path.into());
        self
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let mut editor = DefaultEditor::new().map_err(|e| ChannelError::StartupFailed {
            name: "console".to_string(),
            reason: e.to_string(),
        })?;
        if let Some(path) = &self.history {
            if editor.load_history(path).is_err() {
                tracing::debug!("No console history at {}", path.display());
            }
        }

        let (tx, rx) = mpsc::channel(32);
        let history = self.history.clone();

        // rustyline blocks, so it gets its own thread.
        tokio::task::spawn_blocking(move || {
            loop {
                match editor.readline(PROMPT) {
                    Ok(line) => {
                        if !line.trim().is_empty() {
                            let _ = editor.add_history_entry(line.as_str());
                        }
                        if tx.blocking_send(IncomingMessage::new("console", line)).is_err() {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                    Err(e) => {
                        tracing::error!("Console read failed: {}", e);
                        break;
                    }
                }
            }
            if let Some(path) = history {
                if let Err(e) = editor.save_history(&path) {
                    tracing::warn!("Failed to save console history: {}", e);
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        for line in response.lines {
            println!("{}", line);
        }
        Ok(())
    }
}
