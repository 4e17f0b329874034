//! Route method tags
//!
//! One extra member beyond the HTTP verbs: `Ws` marks a route bound to a
//! WebSocket handler. An upgrade request's effective method is `Ws`
//! regardless of the verb on the request line.

use axum::http::Method;
use std::fmt;

/// Method a route binding dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
    Connect,
    Trace,
    /// WebSocket upgrade
    Ws,
}

impl RouteMethod {
    /// Translate a parsed HTTP method; unknown methods map to `None`
    pub fn from_http(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(RouteMethod::Get),
            Method::POST => Some(RouteMethod::Post),
            Method::PUT => Some(RouteMethod::Put),
            Method::DELETE => Some(RouteMethod::Delete),
            Method::PATCH => Some(RouteMethod::Patch),
            Method::OPTIONS => Some(RouteMethod::Options),
            Method::HEAD => Some(RouteMethod::Head),
            Method::CONNECT => Some(RouteMethod::Connect),
            Method::TRACE => Some(RouteMethod::Trace),
            _ => None,
        }
    }

    /// Whether this is the WebSocket pseudo-method
    pub fn is_ws(&self) -> bool {
        matches!(self, RouteMethod::Ws)
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
            RouteMethod::Put => "PUT",
            RouteMethod::Delete => "DELETE",
            RouteMethod::Patch => "PATCH",
            RouteMethod::Options => "OPTIONS",
            RouteMethod::Head => "HEAD",
            RouteMethod::Connect => "CONNECT",
            RouteMethod::Trace => "TRACE",
            RouteMethod::Ws => "WS",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_standard_methods() {
        assert_eq!(RouteMethod::from_http(&Method::GET), Some(RouteMethod::Get));
        assert_eq!(
            RouteMethod::from_http(&Method::DELETE),
            Some(RouteMethod::Delete)
        );
    }

    #[test]
    fn ws_is_never_parsed_from_the_request_line() {
        let custom = Method::from_bytes(b"WS").unwrap();
        assert_eq!(RouteMethod::from_http(&custom), None);
    }
}
