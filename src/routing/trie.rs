//! Trie storage for route patterns
//!
//! Patterns are sequences of non-empty segments split on `/`. A segment
//! is a literal, a `:name` parameter, or the `*` wildcard. Patterns
//! sharing a prefix share that prefix's trie path; the terminal node of
//! each inserted pattern carries the canonical pattern string, so no
//! parent back-references are needed to reconstruct it.

use std::collections::HashMap;

/// Result of a successful lookup: the canonical inserted pattern plus
/// the captured parameter segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Canonical pattern string, parameters kept in `:name` form
    pub canonical: String,
    /// Parameter name to matched segment text
    pub params: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct TrieNode {
    segment: String,
    children: Vec<TrieNode>,
    /// Set on the terminal node of an inserted pattern
    canonical: Option<String>,
}

impl TrieNode {
    fn new(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
            children: Vec::new(),
            canonical: None,
        }
    }

    /// Whether this node's segment accepts the given request segment
    fn matches(&self, segment: &str) -> bool {
        self.segment == segment || self.segment == "*" || self.segment.starts_with(':')
    }
}

/// Trie of route patterns with `:param` and `*` segments
#[derive(Debug, Clone)]
pub struct RouteTrie {
    root: TrieNode,
}

impl RouteTrie {
    /// Create an empty trie
    pub fn new() -> Self {
        Self {
            root: TrieNode::new(""),
        }
    }

    /// Insert a pattern and return its canonical string. Re-inserting a
    /// pattern returns the same canonical string.
    pub fn insert(&mut self, pattern: &str) -> String {
        let segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let canonical = if segments.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", segments.join("/"))
        };

        let mut node = &mut self.root;
        for segment in segments {
            let position = node.children.iter().position(|c| c.segment == segment);
            let index = match position {
                Some(index) => index,
                None => {
                    node.children.push(TrieNode::new(segment));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[index];
        }
        node.canonical = Some(canonical.clone());
        canonical
    }

    /// Walk the trie for a request path. Children are tried in insertion
    /// order; a `:param` child records the matched segment text.
    ///
    /// The walk inherits a quirk from the framework this matcher is
    /// modelled on: a chosen child whose children count equals the raw
    /// `/`-split segment count of the request path (empty segments
    /// included) is treated as a miss. For well-formed absolute paths the
    /// raw count exceeds the non-empty count, so the condition rarely
    /// fires, but it is observable and kept intact.
    pub fn find(&self, path: &str) -> Option<RouteMatch> {
        let raw_segment_count = path.split('/').count();
        let segments = path.split('/').filter(|s| !s.is_empty());

        let mut node = &self.root;
        let mut params = HashMap::new();
        for segment in segments {
            let child = node.children.iter().find(|c| c.matches(segment))?;
            if child.children.len() == raw_segment_count {
                return None;
            }
            if let Some(name) = child.segment.strip_prefix(':') {
                params.insert(name.to_string(), segment.to_string());
            }
            node = child;
        }

        node.canonical.as_ref().map(|canonical| RouteMatch {
            canonical: canonical.clone(),
            params,
        })
    }

    /// Whether any pattern has been inserted
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty() && self.root.canonical.is_none()
    }
}

impl Default for RouteTrie {
    fn default() -> Self {
        Self::new()
    }
}
