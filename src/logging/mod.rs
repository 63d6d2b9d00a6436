//! Structured logging for the registration pipeline.
//!
//! Console output through a fmt layer, optional JSON file output through
//! a daily-rolling appender. Each pair session logs under a span carrying
//! the tile identities and a per-session id.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error).
    pub global_level: String,

    /// Enable console output.
    pub console_output: bool,

    /// Directory for log files (None = no file logging).
    pub log_directory: Option<PathBuf>,

    /// Include file location in logs (impacts performance).
    pub include_file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];

        if !valid_levels.contains(&self.global_level.as_str()) {
            return Err(format!(
                "Invalid global_level: {}. Must be one of: {:?}",
                self.global_level, valid_levels
            ));
        }

        Ok(())
    }
}

/// Initialize the tracing subscriber.
///
/// The returned guard keeps the non-blocking file writer alive; hold it
/// for the life of the process when file logging is enabled.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}={}",
            env!("CARGO_PKG_NAME").replace('-', "_"),
            config.global_level
        ))
    });

    let mut layers = Vec::new();
    let mut guard = None;

    if config.console_output {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_file_location)
            .with_line_number(config.include_file_location);
        layers.push(console_layer.boxed());
    }

    if let Some(ref log_dir) = config.log_directory {
        let file_appender = tracing_appender::rolling::daily(log_dir, "registration.log");
        let (non_blocking, g) = tracing_appender::non_blocking(file_appender);
        guard = Some(g);

        let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false).json();
        layers.push(file_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .init();

    Ok(guard)
}
