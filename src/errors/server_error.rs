//! Startup and configuration errors
//!
//! Everything in here is surfaced synchronously from `Server::listen`;
//! the server does not start when any of these fire.

use std::net::SocketAddr;
use thiserror::Error;

/// Result type for server lifecycle operations
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that abort server startup
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("WebSocket port {port} must differ from the HTTP port in performance mode")]
    SamePort { port: u16 },

    #[error("a WebSocket route is registered but no wsPort is configured for performance mode")]
    WsPortRequired,

    #[error("invalid listen address '{addr}': {message}")]
    InvalidAddress { addr: String, message: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS setup failed: {message}")]
    Tls { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("worker startup failed: {message}")]
    Worker { message: String },
}

impl ServerError {
    /// Create a TLS setup error
    pub fn tls<T: Into<String>>(message: T) -> Self {
        ServerError::Tls {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<T: Into<String>>(message: T) -> Self {
        ServerError::Config {
            message: message.into(),
        }
    }

    /// Create a worker startup error
    pub fn worker<T: Into<String>>(message: T) -> Self {
        ServerError::Worker {
            message: message.into(),
        }
    }
}
