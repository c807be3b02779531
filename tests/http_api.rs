//! End-to-end tests for `POST /messages`, read back by a line client

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::codec::{Framed, LinesCodec};

use chat_relay::connection::Limits;
use chat_relay::hub::Hub;
use chat_relay::{http, line};

const WAIT: Duration = Duration::from_secs(5);

/// Start the line listener and the HTTP API on one hub; returns (line, http)
async fn start_server() -> (SocketAddr, SocketAddr) {
    let hub = Hub::spawn("general", 64);
    let line_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let line_addr = line_listener.local_addr().unwrap();
    let http_addr = http_listener.local_addr().unwrap();
    tokio::spawn(line::listen(line_listener, hub.clone(), Limits::default()));
    tokio::spawn(http::listen(http_listener, hub));
    (line_addr, http_addr)
}

/// Send one request and return (status code, body)
async fn request(addr: SocketAddr, method: &str, path: &str, body: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let raw = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        method,
        path,
        addr,
        body.len(),
        body
    );
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    timeout(WAIT, stream.read_to_end(&mut response))
        .await
        .expect("timed out waiting for a response")
        .unwrap();
    let response = String::from_utf8(response).unwrap();

    let status = response
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("no status line");
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

async fn join_line(addr: SocketAddr, name: &str) -> Framed<TcpStream, LinesCodec> {
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut lines = Framed::new(stream, LinesCodec::new());
    lines.send(name.to_string()).await.unwrap();
    let joined = format!("(chatbot): {} has joined general", name);
    loop {
        if next_line(&mut lines).await == joined {
            return lines;
        }
    }
}

async fn next_line(lines: &mut Framed<TcpStream, LinesCodec>) -> String {
    timeout(WAIT, lines.next())
        .await
        .expect("timed out waiting for a line")
        .expect("connection closed")
        .unwrap()
}

#[tokio::test]
async fn test_posted_message_reaches_line_client() {
    let (line_addr, http_addr) = start_server().await;
    let mut alice = join_line(line_addr, "alice").await;

    let (status, body) = request(
        http_addr,
        "POST",
        "/messages",
        r#"{"username": "webhook", "channel": "general", "text": "deploy done"}"#,
    )
    .await;
    assert_eq!(status, 200);
    let receipt: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(receipt["channel"], "general");

    assert_eq!(next_line(&mut alice).await, "[general] (webhook): deploy done");
}

#[tokio::test]
async fn test_post_to_named_and_unknown_channels() {
    let (line_addr, http_addr) = start_server().await;
    let mut alice = join_line(line_addr, "alice").await;
    alice.send("/newroom ops".to_string()).await.unwrap();
    loop {
        if next_line(&mut alice).await.contains("has joined ops") {
            break;
        }
    }

    let (status, _) = request(
        http_addr,
        "POST",
        "/messages",
        r#"{"username": "webhook", "channel": "ops", "text": "paged"}"#,
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(next_line(&mut alice).await, "[ops] (webhook): paged");

    // Unknown channels are reported, not created
    let (status, body) = request(
        http_addr,
        "POST",
        "/messages",
        r#"{"username": "webhook", "channel": "nowhere", "text": "hi"}"#,
    )
    .await;
    assert_eq!(status, 404);
    assert!(body.contains("nowhere"));
}

#[tokio::test]
async fn test_home_page_points_at_messages() {
    let (_, http_addr) = start_server().await;
    let (status, body) = request(http_addr, "GET", "/", "").await;
    assert_eq!(status, 200);
    assert!(body.contains("/messages"));
}
