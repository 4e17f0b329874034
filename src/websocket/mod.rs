//! WebSocket sessions, rooms, and fan-out
//!
//! A `WsConnection` wraps one upgraded transport and delegates room and
//! fan-out operations to the `SocketManager` owning it. Each WS route
//! handler owns its own manager, so rooms at different paths live in
//! disjoint namespaces.

pub mod connection;
pub mod manager;
pub mod notifier;
pub mod types;

pub use connection::{WsCallback, WsConnection};
pub use manager::SocketManager;
pub use notifier::SocketNotifier;
pub use types::{
    CloseFrame, EventEnvelope, SocketConfig, SocketError, SocketMessage, SocketResult,
};
