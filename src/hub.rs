//! Hub actor implementation
//!
//! The central actor that owns all chat state: sessions, channels and mute
//! sets. Connections never touch this state; they send [`HubCommand`]s
//! through one queue and the hub applies them one at a time, so every
//! mutation and every broadcast happens in queue order.
//!
//! The hub never waits on a client. Messages go into each session's bounded
//! outbound queue with `try_send`; a session whose queue is full or closed is
//! evicted once the current command is done.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::channel::ChannelRegistry;
use crate::command::HELP;
use crate::error::{AppError, ChatError};
use crate::message::{Command, ServerMessage};
use crate::session::Session;
use crate::types::ConnectionId;

/// Messages queued for a session on admission (welcome and join notice),
/// before its writer is running. A smaller outbound queue is evicted at once.
pub const MIN_OUTBOUND_BUFFER: usize = 2;

/// Commands sent from connections to the hub
#[derive(Debug)]
pub enum HubCommand {
    /// Handshake finished: claim `name` for this connection
    Admit {
        name: String,
        conn_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
        closer: oneshot::Sender<()>,
        reply: oneshot::Sender<Result<(), ChatError>>,
    },
    /// A request from an admitted session
    Request {
        conn_id: ConnectionId,
        name: String,
        command: Command,
        at: DateTime<Utc>,
    },
    /// Transport closed or failed
    Disconnect { conn_id: ConnectionId, name: String },
    /// Channel text from outside any session (HTTP). `channel: None` means
    /// the default channel; the reply carries the channel it went to.
    Post {
        username: String,
        channel: Option<String>,
        text: String,
        at: DateTime<Utc>,
        reply: oneshot::Sender<Result<String, ChatError>>,
    },
}

/// Cloneable sending side of the hub queue
#[derive(Debug, Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Wrap an existing hub queue sender
    pub fn new(sender: mpsc::Sender<HubCommand>) -> Self {
        Self { sender }
    }

    /// Ask the hub to admit `name`. The outer error means the hub is gone;
    /// the inner one is the hub's verdict on the name.
    pub async fn admit(
        &self,
        name: String,
        conn_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
        closer: oneshot::Sender<()>,
    ) -> Result<Result<(), ChatError>, AppError> {
        let (reply, verdict) = oneshot::channel();
        self.send(HubCommand::Admit {
            name,
            conn_id,
            sender,
            closer,
            reply,
        })
        .await?;
        verdict.await.map_err(|_| AppError::HubClosed)
    }

    /// Submit a request on behalf of an admitted session
    pub async fn submit(
        &self,
        conn_id: ConnectionId,
        name: &str,
        command: Command,
    ) -> Result<(), AppError> {
        self.send(HubCommand::Request {
            conn_id,
            name: name.to_string(),
            command,
            at: Utc::now(),
        })
        .await
    }

    /// Report that the connection is gone
    pub async fn disconnect(&self, conn_id: ConnectionId, name: &str) {
        let _ = self
            .send(HubCommand::Disconnect {
                conn_id,
                name: name.to_string(),
            })
            .await;
    }

    /// Broadcast `text` as `username` without a session. The inner error is
    /// the hub's verdict; on success it holds the channel name.
    pub async fn post(
        &self,
        username: &str,
        channel: Option<String>,
        text: &str,
    ) -> Result<Result<String, ChatError>, AppError> {
        let (reply, verdict) = oneshot::channel();
        self.send(HubCommand::Post {
            username: username.to_string(),
            channel,
            text: text.to_string(),
            at: Utc::now(),
            reply,
        })
        .await?;
        verdict.await.map_err(|_| AppError::HubClosed)
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), AppError> {
        self.sender.send(cmd).await.map_err(|_| AppError::HubClosed)
    }
}

/// The hub actor
pub struct Hub {
    /// Connected sessions: name -> Session
    sessions: HashMap<String, Session>,
    /// All channels, default included
    channels: ChannelRegistry,
    /// Sessions whose outbound queue failed during the current command
    evictions: Vec<(String, ConnectionId)>,
    /// Command receiver channel
    receiver: mpsc::Receiver<HubCommand>,
}

impl Hub {
    /// Create a hub with the given default channel and command receiver
    pub fn new(default_channel: impl Into<String>, receiver: mpsc::Receiver<HubCommand>) -> Self {
        Self {
            sessions: HashMap::new(),
            channels: ChannelRegistry::new(default_channel),
            evictions: Vec::new(),
            receiver,
        }
    }

    /// Start a hub task and return its handle
    pub fn spawn(default_channel: impl Into<String>, queue_capacity: usize) -> HubHandle {
        let (tx, rx) = mpsc::channel(queue_capacity);
        tokio::spawn(Hub::new(default_channel, rx).run());
        HubHandle::new(tx)
    }

    /// Run the hub event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!(
            "Hub started, default channel is {}",
            self.channels.default_name()
        );

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("Hub shutting down");
    }

    /// Process a single command, then any evictions it caused
    fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Admit {
                name,
                conn_id,
                sender,
                closer,
                reply,
            } => self.handle_admit(name, conn_id, sender, closer, reply),
            HubCommand::Request {
                conn_id,
                name,
                command,
                at,
            } => {
                if self.owns(&name, conn_id) {
                    self.handle_request(&name, command, at);
                } else {
                    debug!("Ignoring request from stale connection {} ({})", conn_id, name);
                }
            }
            HubCommand::Disconnect { conn_id, name } => {
                if self.owns(&name, conn_id) {
                    self.remove_session(&name, "disconnected");
                }
            }
            HubCommand::Post {
                username,
                channel,
                text,
                at,
                reply,
            } => {
                let verdict = self.handle_post(&username, channel, &text, at);
                let _ = reply.send(verdict);
            }
        }

        self.evict_pending();
    }

    /// Dispatch table: one handler per command kind
    fn handle_request(&mut self, name: &str, command: Command, at: DateTime<Utc>) {
        match command {
            Command::Join { channel } => self.handle_join(name, channel, at),
            Command::Create { channel } => self.handle_create(name, channel, at),
            Command::Leave { channel } => self.handle_leave(name, channel, at),
            Command::Text { channel, text } => self.handle_text(name, channel, text, at),
            Command::Mute { user } => self.handle_mute(name, user),
            Command::Unmute { user } => self.handle_unmute(name, user),
            Command::ListMutes => self.handle_list_mutes(name),
            Command::Direct { user, text } => self.handle_direct(name, user, text, at),
            Command::Quit => self.remove_session(name, "quit"),
            Command::ListUsers { channel } => self.handle_list_users(name, channel),
            Command::ListChannels => {
                let names = self.channels.names();
                self.reply(name, ServerMessage::Channels { names });
            }
        }
    }

    /// Handle a finished handshake
    fn handle_admit(
        &mut self,
        name: String,
        conn_id: ConnectionId,
        sender: mpsc::Sender<ServerMessage>,
        closer: oneshot::Sender<()>,
        reply: oneshot::Sender<Result<(), ChatError>>,
    ) {
        let name = name.trim().to_string();
        let verdict = ChatError::check_name(&name).and_then(|()| {
            if self.sessions.contains_key(&name) {
                Err(ChatError::NameUnavailable(name.clone()))
            } else {
                Ok(())
            }
        });
        if let Err(e) = verdict {
            debug!("Connection {} refused name '{}': {}", conn_id, name, e);
            let _ = reply.send(Err(e));
            return;
        }
        if reply.send(Ok(())).is_err() {
            debug!("Connection {} went away before admission", conn_id);
            return;
        }

        let default = self.channels.default_name().to_string();
        self.sessions.insert(
            name.clone(),
            Session::new(name.clone(), conn_id, default.clone(), sender, closer),
        );
        if let Some(channel) = self.channels.get_mut(&default) {
            channel.add(&name);
        }
        info!(
            "Connection {} joined as '{}' ({} online)",
            conn_id,
            name,
            self.sessions.len()
        );

        self.reply(
            &name,
            ServerMessage::notice(format!(
                "Hello {}, welcome to the chat room\n{}",
                name, HELP
            )),
        );
        self.broadcast(
            &default,
            ServerMessage::Joined {
                channel: default.clone(),
                username: name,
                time: Utc::now(),
            },
            None,
        );
    }

    /// Handle channel joining
    fn handle_join(&mut self, name: &str, channel: String, at: DateTime<Utc>) {
        if channel.is_empty() {
            self.reply_error(name, ChatError::empty("Room name cannot be empty"));
            return;
        }
        let Some(ch) = self.channels.get_mut(&channel) else {
            self.reply_error(name, ChatError::UnknownChannel(channel));
            return;
        };

        let added = ch.add(name);
        if let Some(session) = self.sessions.get_mut(name) {
            session.current_channel = channel.clone();
        }
        if !added {
            self.reply_error(name, ChatError::AlreadyInChannel(channel));
            return;
        }

        info!("'{}' joined channel {}", name, channel);
        self.broadcast(
            &channel,
            ServerMessage::Joined {
                channel: channel.clone(),
                username: name.to_string(),
                time: at,
            },
            None,
        );
    }

    /// Handle channel creation; an existing name is joined instead
    fn handle_create(&mut self, name: &str, channel: String, at: DateTime<Utc>) {
        if channel.is_empty() {
            self.reply_error(name, ChatError::empty("Room name cannot be empty"));
            return;
        }
        if self.channels.create(&channel) {
            info!(
                "'{}' created channel {} ({} channels)",
                name,
                channel,
                self.channels.len()
            );
        }
        self.handle_join(name, channel, at);
    }

    /// Handle voluntary channel leaving
    fn handle_leave(&mut self, name: &str, channel: String, at: DateTime<Utc>) {
        if channel.is_empty() {
            self.reply_error(name, ChatError::empty("Room name cannot be empty"));
            return;
        }
        let default = self.channels.default_name().to_string();
        if channel == default {
            self.reply_error(name, ChatError::CannotLeaveDefault(default));
            return;
        }
        let Some(ch) = self.channels.get_mut(&channel) else {
            self.reply_error(name, ChatError::UnknownChannel(channel));
            return;
        };
        if !ch.remove(name) {
            self.reply_error(name, ChatError::NotAMember(channel));
            return;
        }
        if let Some(session) = self.sessions.get_mut(name) {
            session.current_channel = default.clone();
        }

        info!("'{}' left channel {}", name, channel);
        self.reply(
            name,
            ServerMessage::Left {
                channel: channel.clone(),
                current: default,
            },
        );
        self.broadcast(
            &channel,
            ServerMessage::Parted {
                channel: channel.clone(),
                username: name.to_string(),
                time: at,
            },
            None,
        );
    }

    /// Handle channel chat
    fn handle_text(&mut self, name: &str, channel: Option<String>, text: String, at: DateTime<Utc>) {
        let text = text.trim();
        if text.is_empty() {
            self.reply_error(name, ChatError::empty("Message cannot be empty"));
            return;
        }
        let channel = match channel {
            Some(channel) => channel,
            None => match self.sessions.get(name) {
                Some(session) => session.current_channel.clone(),
                None => return,
            },
        };
        if !self.channels.contains(&channel) {
            debug!("Dropping message from '{}' to unknown channel {}", name, channel);
            return;
        }

        debug!("({} to {}): {}", name, channel, text);
        let msg = ServerMessage::Text {
            channel: channel.clone(),
            from: name.to_string(),
            text: text.to_string(),
            time: at,
        };
        self.broadcast(&channel, msg, Some(name));
    }

    /// Handle text posted over HTTP. The poster needs no session, but the
    /// name must be well formed and the channel must exist.
    fn handle_post(
        &mut self,
        username: &str,
        channel: Option<String>,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<String, ChatError> {
        let username = username.trim();
        ChatError::check_name(username)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::empty("Message cannot be empty"));
        }
        let channel = match channel.map(|c| c.trim().to_string()) {
            Some(c) if !c.is_empty() => c,
            _ => self.channels.default_name().to_string(),
        };
        if !self.channels.contains(&channel) {
            return Err(ChatError::UnknownChannel(channel));
        }

        info!("'{}' posted to {} over HTTP", username, channel);
        let msg = ServerMessage::Text {
            channel: channel.clone(),
            from: username.to_string(),
            text: text.to_string(),
            time: at,
        };
        self.broadcast(&channel, msg, Some(username));
        Ok(channel)
    }

    /// Handle muting a peer
    fn handle_mute(&mut self, name: &str, user: String) {
        if user.is_empty() {
            self.reply_error(name, ChatError::empty("User name cannot be empty"));
            return;
        }
        if user == name {
            self.reply_error(name, ChatError::SelfMute);
            return;
        }
        if !self.sessions.contains_key(&user) {
            self.reply_error(name, ChatError::UnknownUser(user));
            return;
        }
        if let Some(session) = self.sessions.get_mut(name) {
            session.mute(&user);
        }
        debug!("'{}' muted '{}'", name, user);
        self.reply(name, ServerMessage::Muted { username: user });
    }

    /// Handle unmuting a peer
    fn handle_unmute(&mut self, name: &str, user: String) {
        if user.is_empty() {
            self.reply_error(name, ChatError::empty("User name cannot be empty"));
            return;
        }
        let removed = self
            .sessions
            .get_mut(name)
            .is_some_and(|session| session.unmute(&user));
        if !removed {
            self.reply_error(name, ChatError::NotMuted(user));
            return;
        }
        debug!("'{}' unmuted '{}'", name, user);
        self.reply(name, ServerMessage::Unmuted { username: user });
    }

    fn handle_list_mutes(&mut self, name: &str) {
        let Some(session) = self.sessions.get(name) else {
            return;
        };
        let names = session.mutes();
        self.reply(name, ServerMessage::Mutes { names });
    }

    /// Handle direct message; goes to both ends regardless of channels
    fn handle_direct(&mut self, name: &str, user: String, text: String, at: DateTime<Utc>) {
        let text = text.trim();
        if user.is_empty() || text.is_empty() {
            self.reply_error(name, ChatError::empty("Usage: /dm <user>:<text>"));
            return;
        }
        if !self.sessions.contains_key(&user) {
            self.reply_error(name, ChatError::UnknownUser(user));
            return;
        }

        debug!("({} to {}): {}", name, user, text);
        let msg = ServerMessage::Direct {
            from: name.to_string(),
            to: user.clone(),
            text: text.to_string(),
            time: at,
        };
        if user != name {
            self.reply(&user, msg.clone());
        }
        self.reply(name, msg);
    }

    fn handle_list_users(&mut self, name: &str, channel: Option<String>) {
        let names = match &channel {
            Some(filter) => match self.channels.get(filter) {
                Some(ch) => ch.member_names(),
                None => {
                    self.reply_error(name, ChatError::UnknownChannel(filter.clone()));
                    return;
                }
            },
            None => {
                let mut names: Vec<String> = self.sessions.keys().cloned().collect();
                names.sort();
                names
            }
        };
        self.reply(name, ServerMessage::Users { channel, names });
    }

    /// Remove a session from the registry, every channel and every mute set,
    /// close its connection and announce the departure
    fn remove_session(&mut self, name: &str, reason: &str) {
        let Some(session) = self.sessions.remove(name) else {
            return;
        };
        let left = self.channels.remove_member_everywhere(name);
        for other in self.sessions.values_mut() {
            other.unmute(name);
        }

        info!(
            "'{}' left the chat ({}), {} online",
            name,
            reason,
            self.sessions.len()
        );
        debug!("'{}' removed from channels {:?}", name, left);

        session.close(ServerMessage::notice("Goodbye!"));

        let default = self.channels.default_name().to_string();
        self.broadcast(
            &default,
            ServerMessage::Departed {
                username: name.to_string(),
                time: Utc::now(),
            },
            None,
        );
    }

    /// Remove sessions whose outbound queue failed. Removal broadcasts a
    /// departure, which can fail more queues, so loop until none are left.
    fn evict_pending(&mut self) {
        while let Some((name, conn_id)) = self.evictions.pop() {
            if self.owns(&name, conn_id) {
                warn!("Evicting '{}': outbound queue full or closed", name);
                self.remove_session(&name, "evicted");
            }
        }
    }

    /// Helper: whether `name` is held by `conn_id`
    fn owns(&self, name: &str, conn_id: ConnectionId) -> bool {
        self.sessions
            .get(name)
            .is_some_and(|session| session.conn_id == conn_id)
    }

    /// Helper: send to one session
    fn reply(&mut self, name: &str, msg: ServerMessage) {
        let Some(session) = self.sessions.get(name) else {
            return;
        };
        if let Err(e) = session.deliver(msg) {
            warn!("Failed to deliver to '{}': {}", name, e);
            self.evictions.push((name.to_string(), session.conn_id));
        }
    }

    fn reply_error(&mut self, name: &str, err: ChatError) {
        self.reply(name, err.into());
    }

    /// Helper: send to every member of `channel`, skipping members who
    /// muted `from`. Failed queues are marked for eviction.
    fn broadcast(&mut self, channel: &str, msg: ServerMessage, from: Option<&str>) {
        let Some(ch) = self.channels.get(channel) else {
            return;
        };

        for member in ch.members() {
            let Some(session) = self.sessions.get(member) else {
                continue;
            };
            if from.is_some_and(|sender| session.has_muted(sender)) {
                continue;
            }
            if let Err(e) = session.deliver(msg.clone()) {
                warn!("Broadcast to '{}' in {} failed: {}", member, channel, e);
                self.evictions.push((member.to_string(), session.conn_id));
            }
        }
    }
}
