//! Logging setup
//!
//! `tracing` everywhere, printed through a `tracing-subscriber` fmt layer.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::AppError;

/// Pick the filter directive: `-v` flags first, then RUST_LOG, then config
pub fn filter_directive(config: &LoggingConfig, verbosity: u8, env: Option<String>) -> String {
    match verbosity {
        0 => env
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| config.filter.clone()),
        1 => "chat_relay=debug".to_string(),
        _ => "chat_relay=trace".to_string(),
    }
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig, verbosity: u8) -> Result<(), AppError> {
    let directive = filter_directive(config, verbosity, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| AppError::Logging(format!("bad filter '{}': {}", directive, e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
        }
        None => registry.with(fmt::layer().with_target(true)).try_init(),
    }
    .map_err(|e| AppError::Logging(e.to_string()))
}
