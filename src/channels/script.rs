//! Commands read from a file.

use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

/// Replays a command file line by line.
///
/// Blank lines and lines starting with `#` are skipped. Each command is
/// echoed before its replies so the output reads like a console session.
pub struct ScriptChannel {
    path: PathBuf,
}

impl ScriptChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Command lines of a script, in order.
pub fn script_lines(source: &str) -> Vec<String> {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Channel for ScriptChannel {
    fn name(&self) -> &str {
        "script"
    }

    fn sequential(&self) -> bool {
        true
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let source = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: format!("script {}", self.path.display()),
                reason: e.to_string(),
            })?;
        let messages: Vec<IncomingMessage> = script_lines(&source)
            .into_iter()
            .map(|line| IncomingMessage::new("script", line))
            .collect();
        tracing::info!("Running {} command(s) from {}", messages.len(), self.path.display());
        Ok(Box::pin(stream::iter(messages)))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("> {}", msg.content);
        for line in response.lines {
            println!("{}", line);
        }
        Ok(())
    }
}
