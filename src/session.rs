//! Session struct definition
//!
//! Per-connection state owned by the hub: display name, current channel,
//! mute set and the outbound queue to the connection's writer task.

use std::collections::HashSet;

use tokio::sync::{mpsc, oneshot};

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::ConnectionId;

/// Connected user
///
/// The hub holds the only `Session` for a name. Dropping it (or calling
/// [`Session::close`]) drops the close signal, which tells the connection's
/// writer to flush what is queued and hang up.
#[derive(Debug)]
pub struct Session {
    /// Display name, unique among connected sessions
    pub name: String,
    /// Connection that owns this name
    pub conn_id: ConnectionId,
    /// Where plain text goes
    pub current_channel: String,
    /// Names whose channel messages this user doesn't want to see
    mutes: HashSet<String>,
    /// Hub → connection message queue
    sender: mpsc::Sender<ServerMessage>,
    /// Dropped to close the connection
    _closer: oneshot::Sender<()>,
}

impl Session {
    /// Create a session in `channel`
    pub fn new(
        name: String,
        conn_id: ConnectionId,
        channel: String,
        sender: mpsc::Sender<ServerMessage>,
        closer: oneshot::Sender<()>,
    ) -> Self {
        Self {
            name,
            conn_id,
            current_channel: channel,
            mutes: HashSet::new(),
            sender,
            _closer: closer,
        }
    }

    /// Queue a message for this session without waiting
    ///
    /// A full queue means the client has stopped reading; the hub evicts it
    /// rather than stall everyone else.
    pub fn deliver(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Backlogged,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Mute `name`. Returns false if already muted.
    pub fn mute(&mut self, name: &str) -> bool {
        self.mutes.insert(name.to_string())
    }

    /// Unmute `name`. Returns false if it wasn't muted.
    pub fn unmute(&mut self, name: &str) -> bool {
        self.mutes.remove(name)
    }

    /// Whether messages from `name` are hidden from this session
    pub fn has_muted(&self, name: &str) -> bool {
        self.mutes.contains(name)
    }

    /// Muted names, sorted
    pub fn mutes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.mutes.iter().cloned().collect();
        names.sort();
        names
    }

    /// Close the connection, queueing `farewell` first if there's room
    pub fn close(self, farewell: ServerMessage) {
        let _ = self.deliver(farewell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(capacity: usize) -> (Session, mpsc::Receiver<ServerMessage>, oneshot::Receiver<()>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (close_tx, close_rx) = oneshot::channel();
        let session = Session::new(
            "alice".to_string(),
            ConnectionId::new(),
            "general".to_string(),
            tx,
            close_tx,
        );
        (session, rx, close_rx)
    }

    #[test]
    fn test_session_creation() {
        let (session, _rx, _close) = session(4);
        assert_eq!(session.name, "alice");
        assert_eq!(session.current_channel, "general");
        assert!(session.mutes().is_empty());
    }

    #[test]
    fn test_mute_unmute() {
        let (mut session, _rx, _close) = session(4);

        assert!(session.mute("bob"));
        assert!(!session.mute("bob"));
        assert!(session.mute("carol"));
        assert!(session.has_muted("bob"));
        assert_eq!(session.mutes(), vec!["bob".to_string(), "carol".to_string()]);

        assert!(session.unmute("bob"));
        assert!(!session.unmute("bob"));
        assert!(!session.has_muted("bob"));
    }

    #[test]
    fn test_deliver_backlogged_and_closed() {
        let (session, mut rx, _close) = session(1);

        assert!(session.deliver(ServerMessage::notice("one")).is_ok());
        assert_eq!(
            session.deliver(ServerMessage::notice("two")),
            Err(SendError::Backlogged)
        );
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::notice("one"));

        drop(rx);
        assert_eq!(
            session.deliver(ServerMessage::notice("three")),
            Err(SendError::ChannelClosed)
        );
    }

    #[test]
    fn test_close_signals_connection() {
        let (session, mut rx, mut close_rx) = session(4);
        assert!(close_rx.try_recv().is_err());

        session.close(ServerMessage::notice("bye"));

        assert_eq!(rx.try_recv().unwrap(), ServerMessage::notice("bye"));
        assert_eq!(close_rx.try_recv(), Err(oneshot::error::TryRecvError::Closed));
    }
}
