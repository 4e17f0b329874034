//! Route table: trie match plus handler fetch
//!
//! The trie stores only patterns; handlers live in a map keyed by the
//! canonical pattern string the trie hands back. A lookup is a hit only
//! when both sides agree.

use super::handler::RouteHandler;
use super::trie::{RouteMatch, RouteTrie};
use std::collections::HashMap;

/// Canonical-pattern handler table over a [`RouteTrie`]
#[derive(Debug, Default)]
pub struct RouteTree {
    trie: RouteTrie,
    handlers: HashMap<String, RouteHandler>,
}

impl RouteTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            trie: RouteTrie::new(),
            handlers: HashMap::new(),
        }
    }

    /// Insert a pattern with its handler. Re-inserting a pattern
    /// replaces the handler.
    pub fn insert(&mut self, pattern: &str, handler: RouteHandler) {
        let canonical = self.trie.insert(pattern);
        self.handlers.insert(canonical, handler);
    }

    /// Match a request path and fetch the bound handler
    pub fn lookup(&self, path: &str) -> Option<(&RouteHandler, RouteMatch)> {
        let matched = self.trie.find(path)?;
        let handler = self.handlers.get(&matched.canonical)?;
        Some((handler, matched))
    }

    /// Whether any WS-bound route is registered
    pub fn has_ws_routes(&self) -> bool {
        self.handlers.values().any(RouteHandler::is_ws)
    }

    /// Number of registered routes
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no route is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseCtx;
    use crate::routing::RouteMethod;

    fn noop(method: RouteMethod) -> RouteHandler {
        RouteHandler::http(method, |_req, res: ResponseCtx| async move {
            res.close().await;
            Ok(())
        })
    }

    #[test]
    fn lookup_returns_handler_and_params() {
        let mut tree = RouteTree::new();
        tree.insert("/user/:id", noop(RouteMethod::Get));

        let (handler, matched) = tree.lookup("/user/7").unwrap();
        assert_eq!(handler.method(), RouteMethod::Get);
        assert_eq!(matched.canonical, "/user/:id");
        assert_eq!(matched.params.get("id"), Some(&"7".to_string()));
    }

    #[test]
    fn miss_on_empty_tree() {
        let tree = RouteTree::new();
        assert!(tree.lookup("/").is_none());
        assert!(tree.lookup("/anything").is_none());
    }

    #[test]
    fn reinsert_replaces_the_handler() {
        let mut tree = RouteTree::new();
        tree.insert("/a", noop(RouteMethod::Get));
        tree.insert("/a", noop(RouteMethod::Post));
        assert_eq!(tree.len(), 1);
        let (handler, _) = tree.lookup("/a").unwrap();
        assert_eq!(handler.method(), RouteMethod::Post);
    }

    #[test]
    fn ws_route_detection() {
        let mut tree = RouteTree::new();
        tree.insert("/", noop(RouteMethod::Get));
        assert!(!tree.has_ws_routes());
        tree.insert("/live", RouteHandler::ws(|_conn| async {}));
        assert!(tree.has_ws_routes());
    }
}
