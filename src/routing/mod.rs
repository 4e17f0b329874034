//! Route matching and dispatch
//!
//! Patterns go into a trie (`:name` captures a segment, `*` matches any
//! single segment); the terminal node's canonical string keys a handler
//! table. Dispatch runs middlewares, detects WebSocket upgrades, and
//! invokes the bound callback.

pub mod handler;
pub mod method;
pub mod tree;
pub mod trie;

pub use handler::{DispatchEnv, HttpCallback, RouteCallback, RouteHandler};
pub use method::RouteMethod;
pub use tree::RouteTree;
pub use trie::{RouteMatch, RouteTrie};
