//! Multi-room Chat Relay Library
//!
//! A chat relay built with tokio using the Actor pattern for state
//! management. Clients connect over newline-terminated TCP or over
//! WebSocket with JSON frames; both end up talking to the same hub.
//!
//! # Features
//! - Unique display names, negotiated at connect time
//! - Named channels, with a default channel every session joins
//! - Channel broadcast, direct messages and per-user mutes
//! - Slash commands on the line transport, tagged JSON on WebSocket
//! - `POST /messages` over HTTP for posting without a session
//!
//! # Architecture
//! - [`hub::Hub`] is the central actor owning sessions and channels
//! - Each connection runs [`connection::serve`]: a read task sending
//!   requests to the hub and a write task draining the session's queue
//! - No locks: all state access goes through the hub's queue
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use chat_relay::{connection::Limits, hub::Hub, line};
//!
//! #[tokio::main]
//! async fn main() {
//!     let hub = Hub::spawn("general", 1024);
//!     let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
//!     line::listen(listener, hub, Limits::default()).await;
//! }
//! ```

pub mod channel;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod hub;
pub mod line;
pub mod logging;
pub mod message;
pub mod session;
pub mod types;
pub mod websocket;

// Re-export main types for convenience
pub use channel::{Channel, ChannelRegistry};
pub use config::Config;
pub use error::{AppError, ChatError, SendError, TransportError};
pub use hub::{Hub, HubCommand, HubHandle};
pub use message::{Command, ErrorCode, MessageType, ServerMessage, WireMessage};
pub use session::Session;
pub use types::ConnectionId;
