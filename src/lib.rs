//! # portico
//!
//! A lightweight HTTP + WebSocket serving framework.
//!
//! Applications register HTTP and WebSocket handlers against URL path
//! patterns, optionally install middlewares, and start a listener that
//! serves requests across multiple workers sharing one listening port:
//! - Trie-based route matching with `:param` and `*` segments
//! - Multi-worker listeners over a shared (`SO_REUSEPORT`) socket
//! - WebSocket sessions with rooms and fan-out primitives
//! - A middleware chain with short-circuit semantics
//!
//! Axum carries the bytes underneath; users interact only with framework
//! types.
//!
//! ```rust,no_run
//! use portico::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), portico::ServerError> {
//!     let mut server = Server::new(ServerConfig::default());
//!     server.get("/", |_req, res| async move {
//!         res.send("Hello World!").await;
//!         res.close().await;
//!         Ok(())
//!     });
//!     server.listen().await
//! }
//! ```

// Core modules
pub mod config;
pub mod errors;
pub mod logging;
pub mod middleware;
pub mod relation;
pub mod request;
pub mod response;
pub mod routing;
pub mod server;
pub mod websocket;

// Collaborators - external concerns the core consumes through a narrow interface
pub mod mime;
pub mod static_files;
pub mod tls;

// Main server API
pub use config::{ServerConfig, ServerMode};
pub use errors::{HttpError, HttpResult, ServerError, ServerResult};
pub use server::Server;

// Re-export routing types
pub use routing::{RouteHandler, RouteMatch, RouteMethod, RouteTree, RouteTrie};

// Re-export request/response types
pub use request::{FileUpload, Payload, PartValue, RequestCtx};
pub use response::{ResponseCtx, SetCookie};

// Re-export middleware types
pub use middleware::{
    cors::{CorsConfig, CorsMiddleware},
    security_headers::SecurityHeadersMiddleware,
    Middleware, MiddlewareFn, MiddlewarePipeline,
};

// Re-export WebSocket types
pub use websocket::{
    CloseFrame, EventEnvelope, SocketConfig, SocketError, SocketManager, SocketMessage,
    SocketNotifier, SocketResult, WsConnection,
};

// Re-export the many-to-many relation used for rooms
pub use relation::RelationalMap;

// Re-export static file collaborator
pub use static_files::StaticDir;

/// Commonly used HTTP types, re-exported so callers never import axum.
pub mod http {
    pub use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
}
