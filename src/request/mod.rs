//! Request abstraction
//!
//! `RequestCtx` wraps the parsed request line, headers, matched path
//! parameters and the buffered body behind a cheap-to-clone handle, with
//! helpers for queries, cookies, content-type classification and lazy
//! body parsing.

pub mod payload;

pub use payload::{FileUpload, PartValue, Payload};

use crate::errors::ParseError;
use crate::routing::RouteMethod;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct RequestParts {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    params: HashMap<String, String>,
    body: Bytes,
}

/// Parsed request handle shared across the middleware chain and handler
#[derive(Debug, Clone)]
pub struct RequestCtx {
    inner: Arc<RequestParts>,
}

impl RequestCtx {
    /// Build a request context from its parsed components
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        params: HashMap<String, String>,
        body: Bytes,
    ) -> Self {
        Self {
            inner: Arc::new(RequestParts {
                method,
                uri,
                headers,
                params,
                body,
            }),
        }
    }

    /// The HTTP method on the request line
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// The effective route method: WS for upgrade requests, otherwise
    /// the parsed HTTP method
    pub fn effective_method(&self) -> Option<RouteMethod> {
        if self.is_upgrade() {
            Some(RouteMethod::Ws)
        } else {
            RouteMethod::from_http(&self.inner.method)
        }
    }

    /// Whether the `Connection` header equals `upgrade`, case-insensitively
    pub fn is_upgrade(&self) -> bool {
        self.header_str(header::CONNECTION.as_str())
            .map(|v| v.trim().eq_ignore_ascii_case("upgrade"))
            .unwrap_or(false)
    }

    /// Request path
    pub fn path(&self) -> &str {
        self.inner.uri.path()
    }

    /// Full request URI
    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    /// All request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Path parameters captured by the route match
    pub fn params(&self) -> &HashMap<String, String> {
        &self.inner.params
    }

    /// A single path parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.inner.params.get(name).map(String::as_str)
    }

    /// Raw query string, without the leading `?`
    pub fn query_string(&self) -> Option<&str> {
        self.inner.uri.query()
    }

    /// Query parameters as a string map
    pub fn query(&self) -> HashMap<String, String> {
        self.query_string()
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default()
    }

    /// A single query parameter
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query().remove(name)
    }

    /// Cookies from the `Cookie` header
    pub fn cookies(&self) -> HashMap<String, String> {
        let mut cookies = HashMap::new();
        if let Some(raw) = self.header_str(header::COOKIE.as_str()) {
            for pair in raw.split(';') {
                if let Some((name, value)) = pair.split_once('=') {
                    cookies.insert(name.trim().to_string(), value.trim().to_string());
                }
            }
        }
        cookies
    }

    /// A single cookie value
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().remove(name)
    }

    /// The media type portion of the `Content-Type` header
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
            .map(|v| v.split(';').next().unwrap_or(v).trim())
    }

    /// Whether the body is declared as JSON
    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.eq_ignore_ascii_case("application/json"))
    }

    /// Whether the body is declared as a url-encoded form
    pub fn is_form(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.eq_ignore_ascii_case("application/x-www-form-urlencoded"))
    }

    /// Whether the body is declared as a multipart form
    pub fn is_multipart(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.eq_ignore_ascii_case("multipart/form-data"))
    }

    /// Raw body bytes
    pub fn body_bytes(&self) -> &Bytes {
        &self.inner.body
    }

    /// Body decoded as UTF-8 text
    pub fn body_text(&self) -> Result<&str, ParseError> {
        std::str::from_utf8(&self.inner.body).map_err(|_| ParseError::Encoding)
    }

    /// Body decoded as JSON into a caller-chosen type
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ParseError> {
        serde_json::from_slice(&self.inner.body).map_err(ParseError::from)
    }

    /// Parse the body according to its declared content type. Unknown
    /// content types yield [`Payload::None`].
    pub async fn payload(&self) -> Result<Payload, ParseError> {
        payload::parse(self).await
    }
}
