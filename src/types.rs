//! Basic type definitions for the chat relay
//!
//! Provides the connection identifier newtype and the few names the
//! server reserves for itself.

use uuid::Uuid;

/// Name the server speaks as in notices and prompts. No client may take it.
pub const SERVER_NAME: &str = "chatbot";

/// Longest display name a client may pick
pub const MAX_NAME_LEN: usize = 40;

/// Unique connection identifier (newtype pattern)
///
/// Display names can be reused once a user leaves, so the hub tags every
/// session with the connection that owns it. Events from a connection that no
/// longer owns the name are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
