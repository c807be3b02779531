//! Line-oriented TCP transport
//!
//! Newline-terminated UTF-8 in both directions. Input lines go through the
//! command parser; output is [`ServerMessage::render_line`].

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{error, info};

use crate::connection::{self, Connection, ConnectionReader, ConnectionWriter, Input, Limits};
use crate::error::TransportError;
use crate::hub::HubHandle;
use crate::message::ServerMessage;

type Lines = Framed<TcpStream, LinesCodec>;

/// A TCP client speaking plain lines
pub struct LineConnection {
    framed: Lines,
    peer: String,
}

impl LineConnection {
    pub fn new(stream: TcpStream, max_line_length: usize) -> Self {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(max_line_length)),
            peer,
        }
    }
}

pub struct LineReader {
    lines: SplitStream<Lines>,
}

pub struct LineWriter {
    sink: SplitSink<Lines, String>,
}

impl Connection for LineConnection {
    type Reader = LineReader;
    type Writer = LineWriter;

    fn peer(&self) -> String {
        self.peer.clone()
    }

    fn split(self) -> (LineReader, LineWriter) {
        let (sink, lines) = self.framed.split();
        (LineReader { lines }, LineWriter { sink })
    }
}

#[async_trait]
impl ConnectionReader for LineReader {
    async fn read_name(&mut self) -> Option<Result<String, TransportError>> {
        let line = self.lines.next().await?;
        Some(line.map(|l| l.trim().to_string()).map_err(TransportError::from))
    }

    async fn read_input(&mut self) -> Option<Result<Input, TransportError>> {
        let line = self.lines.next().await?;
        Some(line.map(Input::Line).map_err(TransportError::from))
    }
}

#[async_trait]
impl ConnectionWriter for LineWriter {
    async fn write(&mut self, msg: &ServerMessage) -> Result<(), TransportError> {
        self.sink.send(msg.render_line()).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.sink.close().await;
    }
}

/// Accept line clients forever, one task each
pub async fn listen(listener: TcpListener, hub: HubHandle, limits: Limits) {
    if let Ok(addr) = listener.local_addr() {
        info!("Line server listening on {}", addr);
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New line connection from {}", addr);
                let hub = hub.clone();
                tokio::spawn(async move {
                    let conn = LineConnection::new(stream, limits.max_line_length);
                    if let Err(e) = connection::serve(conn, hub, limits).await {
                        error!("Line connection error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept line connection: {}", e);
            }
        }
    }
}
