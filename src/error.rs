//! Error types for the chat relay
//!
//! `ChatError` is everything a client can get wrong; the hub turns each one
//! into a reply for the requester and carries on. The other enums cover
//! transport failures, queue delivery and process-level faults.

use thiserror::Error;

use crate::types::{MAX_NAME_LEN, SERVER_NAME};

/// User-facing errors
///
/// Never fatal. Each variant renders as the text sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Name already belongs to a connected user
    #[error("Sorry, the name {0} is already taken. Please choose another one.")]
    NameUnavailable(String),

    /// Name fails validation
    #[error("{0}")]
    InvalidName(String),

    /// Channel does not exist
    #[error("Sorry, the channel {0} doesn't exist.")]
    UnknownChannel(String),

    /// No connected user with that name
    #[error("Sorry, the user {0} doesn't exist.")]
    UnknownUser(String),

    /// A required argument was blank; holds the usage hint
    #[error("{0}")]
    EmptyArgument(String),

    /// Muting yourself
    #[error("You can't mute yourself.")]
    SelfMute,

    /// Joining a channel you're already in
    #[error("You're already in {0}. It is now your current channel.")]
    AlreadyInChannel(String),

    /// Leaving a channel you never joined
    #[error("You're not a member of the channel {0}.")]
    NotAMember(String),

    /// Leaving the default channel
    #[error("You can't leave the default channel (which is {0}).")]
    CannotLeaveDefault(String),

    /// Unmuting someone who isn't muted
    #[error("{0} isn't muted.")]
    NotMuted(String),

    /// Line started with `/` but named no known command
    #[error("{0} isn't a command. Type /help to see available commands")]
    UnknownCommand(String),

    /// Structured message could not be understood
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

impl ChatError {
    /// Blank-argument error with the given hint
    pub fn empty(hint: impl Into<String>) -> Self {
        Self::EmptyArgument(hint.into())
    }

    /// Check a candidate display name
    pub fn check_name(name: &str) -> Result<(), ChatError> {
        if name.is_empty() {
            return Err(Self::empty("Your name cannot be empty."));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(Self::InvalidName(format!(
                "Names cannot be more than {} characters.",
                MAX_NAME_LEN
            )));
        }
        if name.chars().any(|c| c.is_whitespace() || c == ':' || c.is_control()) {
            return Err(Self::InvalidName(
                "Names cannot contain spaces or ':'.".to_string(),
            ));
        }
        if name.eq_ignore_ascii_case(SERVER_NAME) {
            return Err(Self::NameUnavailable(name.to_string()));
        }
        Ok(())
    }
}

/// Transport errors
///
/// Any of these ends the connection; the hub sees it as a disconnect.
#[derive(Debug, Error)]
pub enum TransportError {
    /// IO error on the socket
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Line framing error (overlong line, invalid UTF-8, IO)
    #[error("Line codec error: {0}")]
    Lines(#[from] tokio_util::codec::LinesCodecError),

    /// JSON serialization error on an outbound message
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Message send errors
///
/// Occurs when the hub cannot enqueue a message for a session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The outbound queue is full; the client is not keeping up
    #[error("Outbound queue full")]
    Backlogged,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file exists but could not be read
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Config file is not valid TOML for [`crate::config::Config`]
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application-level errors
///
/// Fatal for the connection (or, during bootstrap, for the process).
#[derive(Debug, Error)]
pub enum AppError {
    /// Transport failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// IO error outside a transport (bind, log file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Hub queue closed (hub task ended)
    #[error("Hub is not running")]
    HubClosed,

    /// Configuration rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be initialized
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_name_accepts_plain_names() {
        assert!(ChatError::check_name("alice").is_ok());
        assert!(ChatError::check_name("bob_2").is_ok());
    }

    #[test]
    fn test_check_name_rejects_bad_names() {
        assert!(matches!(
            ChatError::check_name(""),
            Err(ChatError::EmptyArgument(_))
        ));
        assert!(matches!(
            ChatError::check_name("two words"),
            Err(ChatError::InvalidName(_))
        ));
        assert!(matches!(
            ChatError::check_name("a:b"),
            Err(ChatError::InvalidName(_))
        ));
        assert!(matches!(
            ChatError::check_name(&"x".repeat(MAX_NAME_LEN + 1)),
            Err(ChatError::InvalidName(_))
        ));
        assert_eq!(
            ChatError::check_name("ChatBot"),
            Err(ChatError::NameUnavailable("ChatBot".to_string()))
        );
    }

    #[test]
    fn test_error_text() {
        assert_eq!(
            ChatError::UnknownCommand("/foo".to_string()).to_string(),
            "/foo isn't a command. Type /help to see available commands"
        );
        assert_eq!(
            ChatError::NotMuted("bob".to_string()).to_string(),
            "bob isn't muted."
        );
    }
}
