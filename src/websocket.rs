//! WebSocket transport with JSON frames
//!
//! The first text frame must be `{"name": "..."}`. After that every text
//! frame is a [`WireMessage`], and every server message goes out as one.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::connection::{self, Connection, ConnectionReader, ConnectionWriter, Input, Limits};
use crate::error::{AppError, TransportError};
use crate::hub::HubHandle;
use crate::message::{NameRequest, ServerMessage, WireMessage};

type Socket = WebSocketStream<TcpStream>;

/// An upgraded WebSocket client
pub struct WsConnection {
    socket: Socket,
    peer: String,
}

impl WsConnection {
    /// Perform the WebSocket upgrade on an accepted stream. Messages longer
    /// than `max_message_size` bytes are a protocol error.
    pub async fn accept(stream: TcpStream, max_message_size: usize) -> Result<Self, TransportError> {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(max_message_size);
        config.max_frame_size = Some(max_message_size);
        let socket = tokio_tungstenite::accept_async_with_config(stream, Some(config)).await?;
        Ok(Self { socket, peer })
    }
}

pub struct WsReader {
    stream: SplitStream<Socket>,
    peer: String,
}

pub struct WsWriter {
    sink: SplitSink<Socket, Message>,
}

impl Connection for WsConnection {
    type Reader = WsReader;
    type Writer = WsWriter;

    fn peer(&self) -> String {
        self.peer.clone()
    }

    fn split(self) -> (WsReader, WsWriter) {
        let (sink, stream) = self.socket.split();
        (
            WsReader {
                stream,
                peer: self.peer,
            },
            WsWriter { sink },
        )
    }
}

impl WsReader {
    /// Next text frame. Control and binary frames are skipped.
    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => {
                    debug!("{} sent close frame", self.peer);
                    return None;
                }
                Ok(Message::Binary(_)) => {
                    warn!("Ignoring binary frame from {}", self.peer);
                }
                // Pongs are answered by tungstenite
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

#[async_trait]
impl ConnectionReader for WsReader {
    async fn read_name(&mut self) -> Option<Result<String, TransportError>> {
        let text = match self.next_text().await? {
            Ok(text) => text,
            Err(e) => return Some(Err(e)),
        };
        // An unreadable frame counts as a blank name, so the client is asked again
        let name = match serde_json::from_str::<NameRequest>(&text) {
            Ok(request) => request.name.trim().to_string(),
            Err(e) => {
                warn!("Invalid handshake frame from {}: {}", self.peer, e);
                String::new()
            }
        };
        Some(Ok(name))
    }

    async fn read_input(&mut self) -> Option<Result<Input, TransportError>> {
        let text = match self.next_text().await? {
            Ok(text) => text,
            Err(e) => return Some(Err(e)),
        };
        let input = match serde_json::from_str::<WireMessage>(&text) {
            Ok(wire) => match wire.into_command() {
                Ok(command) => Input::Command(command),
                Err(e) => Input::Malformed(e.to_string()),
            },
            Err(e) => {
                warn!("Invalid JSON from {}: {}", self.peer, e);
                Input::Malformed(e.to_string())
            }
        };
        Some(Ok(input))
    }
}

#[async_trait]
impl ConnectionWriter for WsWriter {
    async fn write(&mut self, msg: &ServerMessage) -> Result<(), TransportError> {
        let json = serde_json::to_string(&WireMessage::from(msg))?;
        self.sink.send(Message::Text(json.into())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

async fn handle_stream(stream: TcpStream, hub: HubHandle, limits: Limits) -> Result<(), AppError> {
    let conn = WsConnection::accept(stream, limits.max_line_length).await?;
    connection::serve(conn, hub, limits).await
}

/// Accept WebSocket clients forever, one task each
pub async fn listen(listener: TcpListener, hub: HubHandle, limits: Limits) {
    if let Ok(addr) = listener.local_addr() {
        info!("WebSocket server listening on ws://{}", addr);
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New WebSocket connection from {}", addr);
                let hub = hub.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_stream(stream, hub, limits).await {
                        error!("WebSocket connection error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept WebSocket connection: {}", e);
            }
        }
    }
}
