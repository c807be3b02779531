//! Server configuration
//!
//! Loaded from a TOML file. Every field has a default, so an empty or missing
//! file gives a working server.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::connection::Limits;
use crate::error::ConfigError;
use crate::hub::MIN_OUTBOUND_BUFFER;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

/// Listener addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// Port of the line-oriented TCP listener
    pub line_port: u16,
    /// Port of the WebSocket listener
    pub ws_port: u16,
    /// Port of the HTTP API
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            line_port: 3000,
            ws_port: 8000,
            http_port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Channel every session joins on admission
    pub default_channel: String,
    /// Per-session outbound queue; a client this far behind is disconnected
    pub outbound_buffer: usize,
    /// Hub request queue
    pub hub_buffer: usize,
    /// Longest accepted input in bytes: one line, or one WebSocket message
    pub max_line_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_channel: "general".to_string(),
            outbound_buffer: 256,
            hub_buffer: 1024,
            max_line_length: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when RUST_LOG is unset
    pub filter: String,
    /// Append logs here instead of writing to stdout
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "chat_relay=info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Parse and validate a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::from_file`], but a missing file means defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let chat = &self.chat;
        if chat.outbound_buffer < MIN_OUTBOUND_BUFFER {
            return Err(ConfigError::Invalid(format!(
                "chat.outbound_buffer must be at least {}",
                MIN_OUTBOUND_BUFFER
            )));
        }
        if chat.hub_buffer == 0 {
            return Err(ConfigError::Invalid(
                "chat.hub_buffer must be greater than 0".to_string(),
            ));
        }
        if chat.max_line_length == 0 {
            return Err(ConfigError::Invalid(
                "chat.max_line_length must be greater than 0".to_string(),
            ));
        }
        if chat.default_channel.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "chat.default_channel cannot be empty".to_string(),
            ));
        }
        if chat.default_channel.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "chat.default_channel '{}' cannot contain whitespace",
                chat.default_channel
            )));
        }
        let server = &self.server;
        let ports = [
            ("server.line_port", server.line_port),
            ("server.ws_port", server.ws_port),
            ("server.http_port", server.http_port),
        ];
        for (i, (name, port)) in ports.iter().enumerate() {
            // Port 0 asks the OS for a free port, so it never clashes
            if *port == 0 {
                continue;
            }
            if let Some((other, _)) = ports[i + 1..].iter().find(|(_, p)| p == port) {
                return Err(ConfigError::Invalid(format!(
                    "{} and {} are both {}",
                    name, other, port
                )));
            }
        }
        Ok(())
    }

    /// Address of the line listener
    pub fn line_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr(&self.server.host, self.server.line_port)
    }

    /// Address of the WebSocket listener
    pub fn ws_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr(&self.server.host, self.server.ws_port)
    }

    /// Address of the HTTP API
    pub fn http_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr(&self.server.host, self.server.http_port)
    }

    /// Per-connection limits for the transports
    pub fn limits(&self) -> Limits {
        Limits {
            outbound_buffer: self.chat.outbound_buffer,
            max_line_length: self.chat.max_line_length,
        }
    }
}

fn parse_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    format!("{}:{}", host, port)
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("bad listen address {}:{}: {}", host, port, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.line_port, 3000);
        assert_eq!(config.server.ws_port, 8000);
        assert_eq!(config.server.http_port, 8080);
        assert_eq!(config.chat.default_channel, "general");
        assert!(config.validate().is_ok());
        assert_eq!(config.line_addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            line_port = 4000

            [chat]
            default_channel = "lobby"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.line_port, 4000);
        assert_eq!(config.server.ws_port, 8000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.chat.default_channel, "lobby");
        assert_eq!(config.chat.outbound_buffer, 256);
        assert_eq!(config.logging.filter, "chat_relay=info");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.chat.outbound_buffer = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        // Admission alone queues two messages
        let mut config = Config::default();
        config.chat.outbound_buffer = 1;
        assert!(config.validate().is_err());
        config.chat.outbound_buffer = 2;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.chat.default_channel = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chat.default_channel = "two words".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.ws_port = config.server.line_port;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.http_port = config.server.ws_port;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.line_port = 0;
        config.server.ws_port = 0;
        config.server.http_port = 0;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.server.host = "not a host".to_string();
        assert!(config.line_addr().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nfilter = \"chat_relay=debug\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.logging.filter, "chat_relay=debug");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chat\nbroken").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
