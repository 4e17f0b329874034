//! Security response headers

use super::{BoxFuture, Middleware};
use crate::request::RequestCtx;
use crate::response::ResponseCtx;

/// Sets a conservative set of browser security headers on every response
#[derive(Debug, Clone, Default)]
pub struct SecurityHeadersMiddleware;

impl SecurityHeadersMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for SecurityHeadersMiddleware {
    fn handle(&self, _req: RequestCtx, res: ResponseCtx) -> BoxFuture<bool> {
        Box::pin(async move {
            res.header("X-XSS-Protection", "1; mode=block").await;
            res.header("X-Content-Type-Options", "nosniff").await;
            res.header("X-Frame-Options", "SAMEORIGIN").await;
            res.header("Referrer-Policy", "same-origin").await;
            res.header("Content-Security-Policy", "default-src 'self'")
                .await;
            true
        })
    }

    fn name(&self) -> &'static str {
        "security-headers"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method, Uri};
    use std::collections::HashMap;

    #[tokio::test]
    async fn sets_all_headers_and_continues() {
        let req = RequestCtx::new(
            Method::GET,
            Uri::from_static("/"),
            HeaderMap::new(),
            HashMap::new(),
            Bytes::new(),
        );
        let res = ResponseCtx::new();
        assert!(SecurityHeadersMiddleware::new().handle(req, res.clone()).await);
        assert_eq!(
            res.header_str("X-Content-Type-Options").await.as_deref(),
            Some("nosniff")
        );
        assert_eq!(
            res.header_str("Content-Security-Policy").await.as_deref(),
            Some("default-src 'self'")
        );
        assert!(!res.is_closed().await);
    }
}
