//! Logging setup built on `tracing`
//!
//! The framework itself only emits `tracing` events; this module is the
//! optional batteries-included subscriber installation for binaries that
//! do not bring their own.

use crate::config::{ServerConfig, ServerMode};
use tracing_subscriber::EnvFilter;

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default level filter when `RUST_LOG` is unset (e.g. "info")
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_format: bool,
    /// Include target (module path) in output
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_target: false,
        }
    }
}

impl LoggingConfig {
    /// Production preset: JSON lines at info level
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
            include_target: true,
        }
    }

    /// Development preset: pretty text at debug level
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            json_format: false,
            include_target: true,
        }
    }
}

/// Install a global subscriber. Returns an error string when a
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.include_target);

    let result = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| format!("failed to install tracing subscriber: {e}"))
}

/// Log the listener topology once at startup
pub fn log_startup_info(config: &ServerConfig, regular_workers: usize, ws_worker: bool) {
    match config.mode {
        ServerMode::Performance => {
            tracing::info!(
                host = %config.host,
                port = config.port,
                ws_port = ?config.ws_port,
                regular_workers,
                ws_worker,
                tls = config.tls_enabled(),
                "starting server in performance mode"
            );
        }
        ServerMode::Compatibility => {
            tracing::info!(
                host = %config.host,
                port = config.port,
                tls = config.tls_enabled(),
                "starting server in compatibility mode"
            );
        }
    }
}

/// Log shutdown once the calling-context listener returns
pub fn log_shutdown_info() {
    tracing::info!("server shut down");
}
