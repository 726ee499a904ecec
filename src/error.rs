//! Error types for the fleet.

use std::time::Duration;

use crate::agent::TaskKind;

/// Failure of a single world action (dig, equip, goal, chat).
///
/// These are transient: engines log them and move on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The action was cut short, usually because the task was cancelled.
    #[error("action interrupted")]
    Interrupted,

    /// The world refused the action (unbreakable block, out of reach, ...).
    #[error("action refused: {reason}")]
    Refused { reason: String },

    /// The target disappeared or is not loaded.
    #[error("target unavailable: {reason}")]
    Unavailable { reason: String },

    /// The connection is gone.
    #[error("agent disconnected")]
    Disconnected,
}

impl ActionError {
    pub fn refused(reason: impl Into<String>) -> Self {
        ActionError::Refused {
            reason: reason.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        ActionError::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Errors raised while routing commands to agents or managing their lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("Bot {name} not found.")]
    AgentNotFound { name: String },

    #[error("{name} is busy ({task})")]
    Busy { name: String, task: TaskKind },

    #[error("Block {material} not found in version {version}")]
    UnknownMaterial { material: String, version: String },

    #[error("Player {player} not found for bot {name}")]
    PlayerNotFound { player: String, name: String },

    #[error("Connection for {name} failed: {reason}")]
    ConnectFailed { name: String, reason: String },

    #[error("Connection for {name} timed out after {timeout:?}")]
    ConnectTimeout { name: String, timeout: Duration },

    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Errors from parsing a console line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Missing argument <{0}>")]
    MissingArgument(&'static str),

    #[error("Invalid {field} '{value}': expected a number")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Invalid {field} '{value}': {reason}")]
    OutOfRange {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Result type for fleet operations.
pub type Result<T> = std::result::Result<T, FleetError>;

/// Errors from console input channels.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}
