//! Channel trait and message types.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::error::ChannelError;

/// A command line received from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Unique message ID.
    pub id: Uuid,
    /// Channel this line came from.
    pub channel: String,
    /// The raw line.
    pub content: String,
    /// When the line was received.
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(channel: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            content: content.into(),
            received_at: Utc::now(),
        }
    }
}

/// Stream of incoming lines.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// Reply lines for one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingResponse {
    pub lines: Vec<String>,
}

impl OutgoingResponse {
    pub fn lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A source of console commands.
///
/// The stream ends when the source is exhausted or the operator closes it.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name, used in logs.
    fn name(&self) -> &str;

    /// Whether each command must settle before the next line is read.
    ///
    /// A settled `start` returns once its agents have connected, so later
    /// lines can address them.
    fn sequential(&self) -> bool {
        false
    }

    /// Start reading commands.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Show the replies to a command.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    /// Release any resources held by the channel.
    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
