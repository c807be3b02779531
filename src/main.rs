//! Chat relay - Entry Point
//!
//! Loads configuration, starts the hub actor and the listeners, then runs
//! until Ctrl-C.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use chat_relay::config::Config;
use chat_relay::error::AppError;
use chat_relay::hub::Hub;
use chat_relay::{http, line, logging, websocket};

#[derive(Parser, Debug)]
#[command(name = "chat_relay", version, about = "Multi-room chat relay over TCP lines, WebSocket and HTTP")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "chat_relay.toml")]
    config: PathBuf,

    /// Interface to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port for line-oriented TCP clients
    #[arg(long)]
    line_port: Option<u16>,

    /// Port for WebSocket clients
    #[arg(long)]
    ws_port: Option<u16>,

    /// Port for the HTTP API
    #[arg(long)]
    http_port: Option<u16>,

    /// Append logs to this file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.line_port {
            config.server.line_port = port;
        }
        if let Some(port) = self.ws_port {
            config.server.ws_port = port;
        }
        if let Some(port) = self.http_port {
            config.server.http_port = port;
        }
        if let Some(path) = &self.log_file {
            config.logging.file = Some(path.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    args.apply(&mut config);
    config.validate()?;

    logging::init(&config.logging, args.verbose)?;

    let line_addr = config.line_addr()?;
    let ws_addr = config.ws_addr()?;
    let http_addr = config.http_addr()?;

    // Every listener must bind before anything is served
    let line_listener = TcpListener::bind(line_addr).await.map_err(|e| {
        error!("Failed to bind line listener on {}: {}", line_addr, e);
        e
    })?;
    let ws_listener = TcpListener::bind(ws_addr).await.map_err(|e| {
        error!("Failed to bind WebSocket listener on {}: {}", ws_addr, e);
        e
    })?;
    let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
        error!("Failed to bind HTTP listener on {}: {}", http_addr, e);
        e
    })?;

    let hub = Hub::spawn(config.chat.default_channel.clone(), config.chat.hub_buffer);

    let limits = config.limits();
    tokio::spawn(line::listen(line_listener, hub.clone(), limits));
    tokio::spawn(websocket::listen(ws_listener, hub.clone(), limits));
    tokio::spawn(http::listen(http_listener, hub));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
