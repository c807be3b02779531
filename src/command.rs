//! Line command parser
//!
//! Turns one line from the line transport into a [`Command`] for the hub,
//! a reply the connection can send by itself, or nothing. Commands start
//! with `/`; anything else is chat text for the sender's current channel.

use crate::error::ChatError;
use crate::message::{Command, ServerMessage};

/// Full command list, sent verbatim by `/help` and on admission
pub const HELP: &str = "Commands:
  /help               see this help message again     (example: /help)
  /join <room>        join an existing room           (example: /join random)
  /newroom <room>     create a room and join it       (example: /newroom random)
  /leave <room>       leave a room                    (example: /leave random)
  /mute <user>        hide a user's room messages     (example: /mute bob)
  /unmute <user>      show a muted user's messages    (example: /unmute bob)
  /mutes              list the users you've muted     (example: /mutes)
  /dm <user>:<text>   send a direct message           (example: /dm bob:hi there)
  /listusers [room]   list users, optionally by room  (example: /listusers random)
  /listrooms          list all rooms                  (example: /listrooms)
  /quit               leave the chat                  (example: /quit)";

/// Outcome of parsing one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// Forward to the hub
    Command(Command),
    /// Answer locally; the hub is not involved
    Reply(ServerMessage),
    /// Blank line
    Empty,
}

impl From<ChatError> for Parsed {
    fn from(err: ChatError) -> Self {
        Parsed::Reply(err.into())
    }
}

/// Handler for one command: (argument, sender's own name)
type Handler = fn(&str, &str) -> Parsed;

const COMMANDS: &[(&str, Handler)] = &[
    ("/help", help),
    ("/join", join),
    ("/newroom", new_room),
    ("/leave", leave),
    ("/mute", mute),
    ("/unmute", unmute),
    ("/mutes", mutes),
    ("/dm", direct),
    ("/listusers", list_users),
    ("/listrooms", list_rooms),
    ("/rooms", list_rooms),
    ("/quit", quit),
];

/// Parse one line sent by `own_name`
pub fn parse(line: &str, own_name: &str) -> Parsed {
    let line = line.trim();
    if line.is_empty() {
        return Parsed::Empty;
    }
    if !line.starts_with('/') {
        return Parsed::Command(Command::Text {
            channel: None,
            text: line.to_string(),
        });
    }

    let name = line.split_whitespace().next().unwrap_or(line);
    let arg = line[name.len()..].trim();

    match COMMANDS.iter().find(|(cmd, _)| *cmd == name) {
        Some((_, handler)) => handler(arg, own_name),
        None => ChatError::UnknownCommand(name.to_string()).into(),
    }
}

fn required(arg: &str, hint: &str) -> Result<String, ChatError> {
    if arg.is_empty() {
        Err(ChatError::empty(hint))
    } else {
        Ok(arg.to_string())
    }
}

fn help(_: &str, _: &str) -> Parsed {
    Parsed::Reply(ServerMessage::notice(HELP))
}

fn join(arg: &str, _: &str) -> Parsed {
    match required(arg, "Room name cannot be empty") {
        Ok(channel) => Parsed::Command(Command::Join { channel }),
        Err(e) => e.into(),
    }
}

fn new_room(arg: &str, _: &str) -> Parsed {
    match required(arg, "Room name cannot be empty") {
        Ok(channel) => Parsed::Command(Command::Create { channel }),
        Err(e) => e.into(),
    }
}

fn leave(arg: &str, _: &str) -> Parsed {
    match required(arg, "Room name cannot be empty") {
        Ok(channel) => Parsed::Command(Command::Leave { channel }),
        Err(e) => e.into(),
    }
}

fn mute(arg: &str, own_name: &str) -> Parsed {
    match required(arg, "User name cannot be empty") {
        Ok(user) if user == own_name => ChatError::SelfMute.into(),
        Ok(user) => Parsed::Command(Command::Mute { user }),
        Err(e) => e.into(),
    }
}

fn unmute(arg: &str, _: &str) -> Parsed {
    match required(arg, "User name cannot be empty") {
        Ok(user) => Parsed::Command(Command::Unmute { user }),
        Err(e) => e.into(),
    }
}

fn mutes(_: &str, _: &str) -> Parsed {
    Parsed::Command(Command::ListMutes)
}

fn direct(arg: &str, _: &str) -> Parsed {
    let usage = || -> Parsed { ChatError::empty("Usage: /dm <user>:<text>").into() };
    let Some((user, text)) = arg.split_once(':') else {
        return usage();
    };
    let (user, text) = (user.trim(), text.trim());
    if user.is_empty() || text.is_empty() {
        return usage();
    }
    Parsed::Command(Command::Direct {
        user: user.to_string(),
        text: text.to_string(),
    })
}

fn list_users(arg: &str, _: &str) -> Parsed {
    Parsed::Command(Command::ListUsers {
        channel: (!arg.is_empty()).then(|| arg.to_string()),
    })
}

fn list_rooms(_: &str, _: &str) -> Parsed {
    Parsed::Command(Command::ListChannels)
}

fn quit(_: &str, _: &str) -> Parsed {
    Parsed::Command(Command::Quit)
}
