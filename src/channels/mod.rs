//! Command input channels.
//!
//! A channel yields console lines and displays replies. [`serve`] feeds one
//! channel into the [`Dispatcher`] until the channel's stream ends.

mod channel;
mod console;
mod script;

pub use channel::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
pub use console::ConsoleChannel;
pub use script::{ScriptChannel, script_lines};

use futures::StreamExt;

use crate::error::ChannelError;
use crate::fleet::Dispatcher;

/// Run every line from `channel` through `dispatcher`, in order.
///
/// Returns the number of lines handled.
pub async fn serve(channel: &dyn Channel, dispatcher: &Dispatcher) -> Result<usize, ChannelError> {
    let mut messages = channel.start().await?;
    tracing::info!("Started channel: {}", channel.name());

    let mut handled = 0;
    while let Some(message) = messages.next().await {
        tracing::debug!(
            message_id = %message.id,
            channel = %message.channel,
            "Line received at {}",
            message.received_at
        );
        let replies = if channel.sequential() {
            dispatcher.handle_line_settled(&message.content).await
        } else {
            dispatcher.handle_line(&message.content).await
        };
        handled += 1;

        let response = OutgoingResponse::lines(replies);
        if response.is_empty() {
            continue;
        }
        if let Err(e) = channel.respond(&message, response).await {
            tracing::warn!("Failed to reply on {}: {}", channel.name(), e);
        }
    }

    channel.shutdown().await?;
    tracing::info!("Channel {} closed after {} line(s)", channel.name(), handled);
    Ok(handled)
}
