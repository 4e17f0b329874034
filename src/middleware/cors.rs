//! Cross-origin resource sharing
//!
//! Sets the `Access-Control-Allow-*` headers from configuration and
//! answers preflight `OPTIONS` requests with an empty 204, stopping the
//! chain.

use super::{BoxFuture, Middleware};
use crate::request::RequestCtx;
use crate::response::ResponseCtx;
use axum::http::{Method, StatusCode};

/// CORS header configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, OPTIONS".to_string(),
            allow_headers: "Content-Type, Authorization".to_string(),
            allow_credentials: false,
        }
    }
}

/// CORS middleware
#[derive(Debug, Clone, Default)]
pub struct CorsMiddleware {
    config: CorsConfig,
}

impl CorsMiddleware {
    /// Permissive defaults: any origin, the common verbs
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CorsConfig) -> Self {
        Self { config }
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, req: RequestCtx, res: ResponseCtx) -> BoxFuture<bool> {
        let config = self.config.clone();
        Box::pin(async move {
            res.header("Access-Control-Allow-Origin", &config.allow_origin)
                .await;
            res.header("Access-Control-Allow-Methods", &config.allow_methods)
                .await;
            res.header("Access-Control-Allow-Headers", &config.allow_headers)
                .await;
            if config.allow_credentials {
                res.header("Access-Control-Allow-Credentials", "true").await;
            }

            if req.method() == Method::OPTIONS {
                res.status(StatusCode::NO_CONTENT).await;
                res.close().await;
                return false;
            }
            true
        })
    }

    fn name(&self) -> &'static str {
        "cors"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Uri};
    use std::collections::HashMap;

    fn request(method: Method) -> RequestCtx {
        RequestCtx::new(
            method,
            Uri::from_static("/anything"),
            HeaderMap::new(),
            HashMap::new(),
            Bytes::new(),
        )
    }

    #[tokio::test]
    async fn preflight_short_circuits_with_204() {
        let res = ResponseCtx::new();
        let verdict = CorsMiddleware::new()
            .handle(request(Method::OPTIONS), res.clone())
            .await;
        assert!(!verdict);
        assert!(res.is_closed().await);
        assert_eq!(res.status_code().await, StatusCode::NO_CONTENT);
        assert_eq!(
            res.header_str("Access-Control-Allow-Origin").await.as_deref(),
            Some("*")
        );
        assert_eq!(
            res.header_str("Access-Control-Allow-Methods").await.as_deref(),
            Some("GET, POST, PUT, DELETE, OPTIONS")
        );
    }

    #[tokio::test]
    async fn plain_requests_continue_with_headers_set() {
        let res = ResponseCtx::new();
        let verdict = CorsMiddleware::new()
            .handle(request(Method::GET), res.clone())
            .await;
        assert!(verdict);
        assert!(!res.is_closed().await);
        assert_eq!(
            res.header_str("Access-Control-Allow-Origin").await.as_deref(),
            Some("*")
        );
    }

    #[tokio::test]
    async fn credentials_header_is_opt_in() {
        let res = ResponseCtx::new();
        CorsMiddleware::new()
            .handle(request(Method::GET), res.clone())
            .await;
        assert!(res
            .header_str("Access-Control-Allow-Credentials")
            .await
            .is_none());

        let res = ResponseCtx::new();
        CorsMiddleware::with_config(CorsConfig {
            allow_credentials: true,
            ..Default::default()
        })
        .handle(request(Method::GET), res.clone())
        .await;
        assert_eq!(
            res.header_str("Access-Control-Allow-Credentials")
                .await
                .as_deref(),
            Some("true")
        );
    }
}
