//! Message protocol definitions
//!
//! [`Command`] is what a client asks the hub to do, one variant per request
//! kind with exactly the fields that kind needs. [`ServerMessage`] is what the
//! hub sends back. Both transports share these types; [`WireMessage`] is the
//! JSON shape used by the structured transport and [`ServerMessage::render_line`]
//! is the text shape used by the line transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::types::SERVER_NAME;

/// Client → hub request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Join an existing channel
    Join { channel: String },
    /// Create a channel, or join it if it already exists
    Create { channel: String },
    /// Leave a channel other than the default one
    Leave { channel: String },
    /// Say something in a channel (`None`: the sender's current channel)
    Text {
        channel: Option<String>,
        text: String,
    },
    /// Stop seeing a peer's channel messages
    Mute { user: String },
    /// Undo a mute
    Unmute { user: String },
    /// List the sender's mutes
    ListMutes,
    /// Private message to one peer
    Direct { user: String, text: String },
    /// Leave the chat
    Quit,
    /// List users, optionally only those in one channel
    ListUsers { channel: Option<String> },
    /// List all channels
    ListChannels,
}

/// Hub → client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Handshake prompt
    Prompt { text: String },
    /// Informational text from the server
    Notice { text: String },
    /// A request failed
    Error { code: ErrorCode, message: String },
    /// Someone joined a channel you're in (or you did)
    Joined {
        channel: String,
        username: String,
        time: DateTime<Utc>,
    },
    /// Someone left a channel you're in
    Parted {
        channel: String,
        username: String,
        time: DateTime<Utc>,
    },
    /// You left `channel`; `current` is where your plain text goes now
    Left { channel: String, current: String },
    /// Channel chat
    Text {
        channel: String,
        from: String,
        text: String,
        time: DateTime<Utc>,
    },
    /// Direct message between `from` and `to`
    Direct {
        from: String,
        to: String,
        text: String,
        time: DateTime<Utc>,
    },
    /// Mute confirmed
    Muted { username: String },
    /// Unmute confirmed
    Unmuted { username: String },
    /// Your mute list
    Mutes { names: Vec<String> },
    /// User listing (filtered by channel when `channel` is set)
    Users {
        channel: Option<String>,
        names: Vec<String>,
    },
    /// Channel listing
    Channels { names: Vec<String> },
    /// A user left the chat
    Departed {
        username: String,
        time: DateTime<Utc>,
    },
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NameUnavailable,
    InvalidName,
    UnknownChannel,
    UnknownUser,
    EmptyArgument,
    /// Self-mute, joining a channel you're already in
    SelfTargetInvalid,
    NotAMember,
    CannotLeaveDefault,
    NotMuted,
    UnknownCommand,
    InvalidMessage,
}

impl From<&ChatError> for ErrorCode {
    fn from(err: &ChatError) -> Self {
        match err {
            ChatError::NameUnavailable(_) => ErrorCode::NameUnavailable,
            ChatError::InvalidName(_) => ErrorCode::InvalidName,
            ChatError::UnknownChannel(_) => ErrorCode::UnknownChannel,
            ChatError::UnknownUser(_) => ErrorCode::UnknownUser,
            ChatError::EmptyArgument(_) => ErrorCode::EmptyArgument,
            ChatError::SelfMute | ChatError::AlreadyInChannel(_) => ErrorCode::SelfTargetInvalid,
            ChatError::NotAMember(_) => ErrorCode::NotAMember,
            ChatError::CannotLeaveDefault(_) => ErrorCode::CannotLeaveDefault,
            ChatError::NotMuted(_) => ErrorCode::NotMuted,
            ChatError::UnknownCommand(_) => ErrorCode::UnknownCommand,
            ChatError::InvalidMessage(_) => ErrorCode::InvalidMessage,
        }
    }
}

/// Convert ChatError to ServerMessage for client notification
impl From<ChatError> for ServerMessage {
    fn from(err: ChatError) -> Self {
        ServerMessage::Error {
            code: ErrorCode::from(&err),
            message: err.to_string(),
        }
    }
}

impl ServerMessage {
    /// Informational notice
    pub fn notice(text: impl Into<String>) -> Self {
        ServerMessage::Notice { text: text.into() }
    }

    /// Handshake prompt
    pub fn prompt(text: impl Into<String>) -> Self {
        ServerMessage::Prompt { text: text.into() }
    }

    /// Render for the line transport (no trailing newline; the codec adds it)
    pub fn render_line(&self) -> String {
        match self {
            ServerMessage::Prompt { text } | ServerMessage::Notice { text } => {
                format!("({}): {}", SERVER_NAME, text)
            }
            ServerMessage::Error { message, .. } => format!("({}): {}", SERVER_NAME, message),
            ServerMessage::Joined {
                channel, username, ..
            } => format!("({}): {} has joined {}", SERVER_NAME, username, channel),
            ServerMessage::Parted {
                channel, username, ..
            } => format!("({}): {} has left {}", SERVER_NAME, username, channel),
            ServerMessage::Left { channel, current } => format!(
                "({}): Left channel {}. Returning you to the {} channel.",
                SERVER_NAME, channel, current
            ),
            ServerMessage::Text {
                channel,
                from,
                text,
                ..
            } => format!("[{}] ({}): {}", channel, from, text),
            ServerMessage::Direct { from, to, text, .. } => {
                format!("(dm {} -> {}): {}", from, to, text)
            }
            ServerMessage::Muted { username } => format!(
                "({}): Muted {}. You won't see their messages.",
                SERVER_NAME, username
            ),
            ServerMessage::Unmuted { username } => {
                format!("({}): Unmuted {}.", SERVER_NAME, username)
            }
            ServerMessage::Mutes { names } if names.is_empty() => {
                format!("({}): You haven't muted anyone.", SERVER_NAME)
            }
            ServerMessage::Mutes { names } => {
                format!("({}): Muted: {}", SERVER_NAME, names.join(", "))
            }
            ServerMessage::Users {
                channel: Some(channel),
                names,
            } => format!(
                "({}): Users in {}: {}",
                SERVER_NAME,
                channel,
                names.join(", ")
            ),
            ServerMessage::Users {
                channel: None,
                names,
            } => format!("({}): Users online: {}", SERVER_NAME, names.join(", ")),
            ServerMessage::Channels { names } => {
                format!("({}): Rooms: {}", SERVER_NAME, names.join(", "))
            }
            ServerMessage::Departed { username, .. } => {
                format!("({}): {} left the chat", SERVER_NAME, username)
            }
        }
    }
}

/// `messageType` values of the structured transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    Join,
    Create,
    Leave,
    Text,
    Mute,
    Unmute,
    Dm,
    Quit,
    ListUsers,
    ListChannels,
}

/// One JSON message of the structured transport
///
/// `channel` is overloaded on the wire: it names a channel for
/// join/create/leave/text/listUsers and a peer for mute/unmute/dm.
/// [`WireMessage::into_command`] is the only place that reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub text: String,
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
    pub message_type: MessageType,
}

/// Handshake frame of the structured transport
#[derive(Debug, Clone, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

impl WireMessage {
    fn new(message_type: MessageType, channel: &str, username: &str, text: String) -> Self {
        Self {
            channel: channel.to_string(),
            username: username.to_string(),
            text,
            time: Utc::now(),
            message_type,
        }
    }

    fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    /// Interpret an inbound message. The sender's identity comes from the
    /// session, so `username` is ignored.
    pub fn into_command(self) -> Result<Command, ChatError> {
        let target = self.channel.trim().to_string();
        let required = |hint: &str| {
            if target.is_empty() {
                Err(ChatError::empty(hint))
            } else {
                Ok(target.clone())
            }
        };
        let optional = || (!target.is_empty()).then(|| target.clone());

        let command = match self.message_type {
            MessageType::Join => Command::Join {
                channel: required("Room name cannot be empty")?,
            },
            MessageType::Create => Command::Create {
                channel: required("Room name cannot be empty")?,
            },
            MessageType::Leave => Command::Leave {
                channel: required("Room name cannot be empty")?,
            },
            MessageType::Text => Command::Text {
                channel: optional(),
                text: self.text,
            },
            MessageType::Mute => Command::Mute {
                user: required("User name cannot be empty")?,
            },
            MessageType::Unmute => Command::Unmute {
                user: required("User name cannot be empty")?,
            },
            MessageType::Dm => Command::Direct {
                user: required("User name cannot be empty")?,
                text: self.text,
            },
            MessageType::Quit => Command::Quit,
            MessageType::ListUsers => Command::ListUsers {
                channel: optional(),
            },
            MessageType::ListChannels => Command::ListChannels,
        };
        Ok(command)
    }
}

impl From<&ServerMessage> for WireMessage {
    fn from(msg: &ServerMessage) -> Self {
        let server = |text: String| WireMessage::new(MessageType::Text, "", SERVER_NAME, text);
        match msg {
            ServerMessage::Prompt { text } | ServerMessage::Notice { text } => server(text.clone()),
            ServerMessage::Error { message, .. } => server(message.clone()),
            ServerMessage::Joined {
                channel,
                username,
                time,
            } => WireMessage::new(
                MessageType::Join,
                channel,
                username,
                format!("{} has joined {}", username, channel),
            )
            .at(*time),
            ServerMessage::Parted {
                channel,
                username,
                time,
            } => WireMessage::new(
                MessageType::Leave,
                channel,
                username,
                format!("{} has left {}", username, channel),
            )
            .at(*time),
            ServerMessage::Left { channel, current } => WireMessage::new(
                MessageType::Leave,
                channel,
                SERVER_NAME,
                format!(
                    "Left channel {}. Returning you to the {} channel.",
                    channel, current
                ),
            ),
            ServerMessage::Text {
                channel,
                from,
                text,
                time,
            } => WireMessage::new(MessageType::Text, channel, from, text.clone()).at(*time),
            ServerMessage::Direct {
                from,
                to,
                text,
                time,
            } => WireMessage::new(MessageType::Dm, to, from, text.clone()).at(*time),
            ServerMessage::Muted { username } => WireMessage::new(
                MessageType::Mute,
                username,
                SERVER_NAME,
                format!("Muted {}", username),
            ),
            ServerMessage::Unmuted { username } => WireMessage::new(
                MessageType::Unmute,
                username,
                SERVER_NAME,
                format!("Unmuted {}", username),
            ),
            ServerMessage::Mutes { names } => server(format!("Muted: {}", names.join(","))),
            ServerMessage::Users { channel, names } => WireMessage::new(
                MessageType::ListUsers,
                channel.as_deref().unwrap_or(""),
                SERVER_NAME,
                names.join(","),
            ),
            ServerMessage::Channels { names } => WireMessage::new(
                MessageType::ListChannels,
                "",
                SERVER_NAME,
                names.join(","),
            ),
            ServerMessage::Departed { username, time } => WireMessage::new(
                MessageType::Quit,
                "",
                username,
                format!("{} left the chat", username),
            )
            .at(*time),
        }
    }
}
