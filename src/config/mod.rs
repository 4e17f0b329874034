//! Server configuration
//!
//! Everything the listener recognises: bind address, serving mode, TLS
//! material paths, and the ambient limits. Values come from `Default`,
//! from explicit construction, or from `PORTICO_*` environment variables.

use crate::errors::{ServerError, ServerResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Default HTTP listening port
pub const DEFAULT_PORT: u16 = 8080;
/// Default bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default cap on buffered request bodies
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 16 * 1024 * 1024;

/// How the listener distributes HTTP and WebSocket traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMode {
    /// HTTP and WS on separate ports, multiple workers per port
    Performance,
    /// One listener on one port handles both
    Compatibility,
}

impl FromStr for ServerMode {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "performance" => Ok(ServerMode::Performance),
            "compatibility" => Ok(ServerMode::Compatibility),
            other => Err(ServerError::config(format!(
                "unknown server mode '{other}', expected 'performance' or 'compatibility'"
            ))),
        }
    }
}

/// Server configuration recognised by the listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP listening port
    pub port: u16,
    /// WebSocket listening port; required in performance mode when WS
    /// routes are registered, and must differ from `port`
    pub ws_port: Option<u16>,
    /// TLS certificate chain file path
    pub certificate_chain: Option<PathBuf>,
    /// TLS private key file path; presence switches the listener to TLS
    pub private_key: Option<PathBuf>,
    /// Passphrase for the private key
    pub password: Option<String>,
    /// Serving mode
    pub mode: ServerMode,
    /// Run the WebSocket listener on the calling context instead of a
    /// dedicated worker
    pub use_websocket_in_main_thread: bool,
    /// Maximum buffered request body size in bytes
    pub max_request_size: usize,
    /// Optional health check endpoint; `None` keeps unmatched paths at 404
    pub health_check_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            ws_port: None,
            certificate_chain: None,
            private_key: None,
            password: None,
            mode: ServerMode::Performance,
            use_websocket_in_main_thread: false,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            health_check_path: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `PORTICO_*` environment variables,
    /// falling back to defaults for anything unset
    pub fn from_env() -> ServerResult<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("PORTICO_HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("PORTICO_PORT") {
            config.port = parse_env("PORTICO_PORT", &port)?;
        }
        if let Ok(ws_port) = env::var("PORTICO_WS_PORT") {
            config.ws_port = Some(parse_env("PORTICO_WS_PORT", &ws_port)?);
        }
        if let Ok(mode) = env::var("PORTICO_MODE") {
            config.mode = mode.parse()?;
        }
        if let Ok(chain) = env::var("PORTICO_CERTIFICATE_CHAIN") {
            config.certificate_chain = Some(PathBuf::from(chain));
        }
        if let Ok(key) = env::var("PORTICO_PRIVATE_KEY") {
            config.private_key = Some(PathBuf::from(key));
        }
        if let Ok(password) = env::var("PORTICO_KEY_PASSWORD") {
            config.password = Some(password);
        }
        if let Ok(max) = env::var("PORTICO_MAX_REQUEST_SIZE") {
            config.max_request_size = parse_env("PORTICO_MAX_REQUEST_SIZE", &max)?;
        }
        if let Ok(path) = env::var("PORTICO_HEALTH_CHECK_PATH") {
            config.health_check_path = Some(path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate field-level constraints; the route-dependent checks
    /// (same-port, ws-port-required) happen at `listen` time
    pub fn validate(&self) -> ServerResult<()> {
        if self.host.is_empty() {
            return Err(ServerError::config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(ServerError::config("port must be non-zero"));
        }
        if self.max_request_size == 0 {
            return Err(ServerError::config("max request size must be non-zero"));
        }
        if let Some(path) = &self.health_check_path {
            if !path.starts_with('/') {
                return Err(ServerError::config(
                    "health check path must start with '/'",
                ));
            }
        }
        if self.certificate_chain.is_some() && self.private_key.is_none() {
            return Err(ServerError::config(
                "a certificate chain without a private key cannot enable TLS",
            ));
        }
        Ok(())
    }

    /// Whether the listener should wrap its sockets in TLS
    pub fn tls_enabled(&self) -> bool {
        self.private_key.is_some()
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> ServerResult<T> {
    value.parse().map_err(|_| {
        ServerError::config(format!("invalid value '{value}' for {name}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.mode, ServerMode::Performance);
        assert!(!config.tls_enabled());
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!(
            "Performance".parse::<ServerMode>().unwrap(),
            ServerMode::Performance
        );
        assert_eq!(
            "COMPATIBILITY".parse::<ServerMode>().unwrap(),
            ServerMode::Compatibility
        );
        assert!("turbo".parse::<ServerMode>().is_err());
    }

    #[test]
    fn zero_port_is_rejected() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn health_check_path_must_be_absolute() {
        let config = ServerConfig {
            health_check_path: Some("status".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn chain_without_key_is_rejected() {
        let config = ServerConfig {
            certificate_chain: Some(PathBuf::from("/tmp/chain.pem")),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
