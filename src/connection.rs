//! Connection driver
//!
//! Everything a transport has to provide is in the [`Connection`],
//! [`ConnectionReader`] and [`ConnectionWriter`] traits. [`serve`] runs one
//! connection on top of them: name handshake, then a read task that turns
//! input into hub requests and a write task that drains the session's
//! outbound queue.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::command::{self, Parsed};
use crate::error::{AppError, ChatError, TransportError};
use crate::hub::{HubHandle, MIN_OUTBOUND_BUFFER};
use crate::message::{Command, ServerMessage};
use crate::types::ConnectionId;

/// How long a closed session's writer keeps flushing before hanging up
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// One unit of client input after transport decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Raw text line, still to be parsed as command or chat
    Line(String),
    /// Already structured request
    Command(Command),
    /// Input the transport could not decode; the reason goes back to the client
    Malformed(String),
}

/// Receiving half of a connection
#[async_trait]
pub trait ConnectionReader: Send + 'static {
    /// Next candidate display name. `None` once the client is gone.
    async fn read_name(&mut self) -> Option<Result<String, TransportError>>;

    /// Next input after the handshake. `None` once the client is gone.
    async fn read_input(&mut self) -> Option<Result<Input, TransportError>>;
}

/// Sending half of a connection
#[async_trait]
pub trait ConnectionWriter: Send + 'static {
    async fn write(&mut self, msg: &ServerMessage) -> Result<(), TransportError>;

    async fn close(&mut self);
}

/// A client transport that can be split into independent halves
pub trait Connection: Send + 'static {
    type Reader: ConnectionReader;
    type Writer: ConnectionWriter;

    /// Peer description for logs
    fn peer(&self) -> String;

    fn split(self) -> (Self::Reader, Self::Writer);
}

/// Per-connection limits
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Capacity of the hub → connection queue
    pub outbound_buffer: usize,
    /// Longest accepted line, or WebSocket message, in bytes
    pub max_line_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            outbound_buffer: 256,
            max_line_length: 4096,
        }
    }
}

/// What a successful handshake hands to the rest of the connection
struct Admitted {
    name: String,
    sender: mpsc::Sender<ServerMessage>,
    receiver: mpsc::Receiver<ServerMessage>,
    closed: oneshot::Receiver<()>,
}

/// Serve one client until it quits, disconnects or is evicted
pub async fn serve<C: Connection>(conn: C, hub: HubHandle, limits: Limits) -> Result<(), AppError> {
    let conn_id = ConnectionId::new();
    let peer = conn.peer();
    debug!("Connection {} from {}", conn_id, peer);

    let (mut reader, mut writer) = conn.split();

    let Some(admitted) = handshake(&mut reader, &mut writer, &hub, conn_id, limits).await? else {
        debug!("Connection {} from {} closed during handshake", conn_id, peer);
        writer.close().await;
        return Ok(());
    };
    let Admitted {
        name,
        sender,
        receiver,
        closed,
    } = admitted;
    info!("'{}' connected from {}", name, peer);

    let mut write_task = tokio::spawn(write_loop(writer, receiver, closed));
    let mut read_task = tokio::spawn(read_loop(reader, hub.clone(), conn_id, name.clone(), sender));

    let read_finished = tokio::select! {
        _ = &mut read_task => true,
        _ = &mut write_task => false,
    };

    if read_finished {
        // Client stopped sending (EOF, error or /quit). The hub closes the
        // session, and the writer flushes what is queued before hanging up.
        debug!("Read task completed for '{}'", name);
        hub.disconnect(conn_id, &name).await;
        let _ = write_task.await;
    } else {
        debug!("Write task completed for '{}'", name);
        read_task.abort();
        hub.disconnect(conn_id, &name).await;
    }

    info!("'{}' disconnected", name);

    Ok(())
}

/// Ask for a display name until the hub accepts one
///
/// No limit on attempts or time; a silent client only holds up itself.
async fn handshake<R: ConnectionReader, W: ConnectionWriter>(
    reader: &mut R,
    writer: &mut W,
    hub: &HubHandle,
    conn_id: ConnectionId,
    limits: Limits,
) -> Result<Option<Admitted>, AppError> {
    writer
        .write(&ServerMessage::prompt("Please enter your username:"))
        .await?;

    loop {
        let Some(candidate) = reader.read_name().await else {
            return Ok(None);
        };
        let candidate = candidate?.trim().to_string();
        if candidate.is_empty() {
            writer
                .write(&ServerMessage::prompt("Please enter your username:"))
                .await?;
            continue;
        }

        let (sender, receiver) = mpsc::channel(limits.outbound_buffer.max(MIN_OUTBOUND_BUFFER));
        let (closer, closed) = oneshot::channel();
        match hub
            .admit(candidate.clone(), conn_id, sender.clone(), closer)
            .await?
        {
            Ok(()) => {
                return Ok(Some(Admitted {
                    name: candidate,
                    sender,
                    receiver,
                    closed,
                }))
            }
            Err(ChatError::NameUnavailable(name)) => {
                writer
                    .write(&ServerMessage::prompt(format!(
                        "Sorry, the name {} is already taken. Please choose another one:",
                        name
                    )))
                    .await?;
            }
            Err(e) => {
                writer.write(&e.into()).await?;
                writer
                    .write(&ServerMessage::prompt("Please enter your username:"))
                    .await?;
            }
        }
    }
}

/// Client input -> hub requests
async fn read_loop<R: ConnectionReader>(
    mut reader: R,
    hub: HubHandle,
    conn_id: ConnectionId,
    name: String,
    local: mpsc::Sender<ServerMessage>,
) {
    while let Some(input) = reader.read_input().await {
        let command = match input {
            Ok(Input::Line(line)) => match command::parse(&line, &name) {
                Parsed::Command(command) => command,
                Parsed::Reply(reply) => {
                    if local.send(reply).await.is_err() {
                        break;
                    }
                    continue;
                }
                Parsed::Empty => continue,
            },
            Ok(Input::Command(command)) => command,
            Ok(Input::Malformed(reason)) => {
                debug!("Malformed input from '{}': {}", name, reason);
                if local
                    .send(ChatError::InvalidMessage(reason).into())
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            }
            Err(e) => {
                warn!("Read error for '{}': {}", name, e);
                break;
            }
        };

        let quitting = command == Command::Quit;
        if hub.submit(conn_id, &name, command).await.is_err() {
            debug!("Hub closed, ending read task for '{}'", name);
            break;
        }
        if quitting {
            break;
        }
    }
    debug!("Read task ended for '{}'", name);
}

/// Outbound queue -> transport
///
/// When the hub closes the session, whatever is already queued is still
/// written before hanging up, for at most [`DRAIN_TIMEOUT`]. A write that is
/// blocked when the close signal arrives is abandoned.
async fn write_loop<W: ConnectionWriter>(
    mut writer: W,
    mut receiver: mpsc::Receiver<ServerMessage>,
    mut closed: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            msg = receiver.recv() => {
                let Some(msg) = msg else { break };
                tokio::select! {
                    biased;
                    result = writer.write(&msg) => {
                        if let Err(e) = result {
                            debug!("Write failed, ending write task: {}", e);
                            break;
                        }
                    }
                    _ = &mut closed => {
                        debug!("Session closed while a write was blocked");
                        break;
                    }
                }
            }
            _ = &mut closed => {
                let drain = async {
                    while let Ok(msg) = receiver.try_recv() {
                        if writer.write(&msg).await.is_err() {
                            break;
                        }
                    }
                };
                if timeout(DRAIN_TIMEOUT, drain).await.is_err() {
                    debug!("Gave up flushing a closed session after {:?}", DRAIN_TIMEOUT);
                }
                break;
            }
        }
    }
    debug!("Write task ended");

    if timeout(DRAIN_TIMEOUT, writer.close()).await.is_err() {
        debug!("Transport close timed out");
    }
}
