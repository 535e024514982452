//! Structured logging setup
//!
//! The library only emits `tracing` events (block production at `debug`,
//! slab window loads at `trace`, read failures at `warn`). Applications call
//! [`init_tracing`] once at startup to print them.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directive, e.g. `RUST_LOG=volume_blocks=debug`

use crate::error::{BlockError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "volume_blocks=info,warn";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human readable output
    Pretty,
    /// One line per event
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter directive, e.g. "volume_blocks=debug,info"
    pub filter: String,
    pub with_ansi: bool,
    /// Show thread names, useful to tell the production thread apart
    pub with_thread_names: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
        Self {
            format: LogFormat::Compact,
            filter,
            with_ansi: true,
            with_thread_names: true,
        }
    }
}

impl LogConfig {
    /// Configuration with an explicit filter directive
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Self::default()
        }
    }
}

/// Install the global tracing subscriber
///
/// Fails if the filter does not parse or a subscriber is already installed.
pub fn init_tracing(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| BlockError::Configuration(format!("Invalid log filter: {}", e)))?;

    let layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(config.with_ansi)
            .with_thread_names(config.with_thread_names)
            .with_filter(filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(config.with_ansi)
            .with_thread_names(config.with_thread_names)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| BlockError::Configuration(format!("Tracing already initialized: {}", e)))
}
