//! Route handler bindings and request dispatch
//!
//! A `RouteHandler` binds one method to either an HTTP or a WS callback
//! and owns the `SocketManager` for its route, giving every WS route a
//! room namespace of its own. `dispatch` runs the full request pipeline:
//! middleware chain, effective-method detection, upgrade or handler
//! invocation, response conversion.

use super::method::RouteMethod;
use crate::errors::HttpResult;
use crate::middleware::{BoxFuture, MiddlewarePipeline};
use crate::request::RequestCtx;
use crate::response::ResponseCtx;
use crate::websocket::connection::{run_socket, WsCallback};
use crate::websocket::{SocketConfig, SocketManager, WsConnection};
use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, WebSocketUpgrade};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error};

/// HTTP handler callback: mutate the response, close it when done
pub type HttpCallback =
    Arc<dyn Fn(RequestCtx, ResponseCtx) -> BoxFuture<HttpResult<()>> + Send + Sync>;

/// The payload of a route binding
#[derive(Clone)]
pub enum RouteCallback {
    Http(HttpCallback),
    Ws(WsCallback),
}

/// Worker-role inputs to dispatch
#[derive(Debug, Clone, Copy)]
pub struct DispatchEnv {
    /// Whether this worker performs WebSocket upgrades
    pub ws_role: bool,
    /// Whether this worker serves only WebSocket traffic (dedicated WS
    /// listener); non-WS requests get 400
    pub ws_only: bool,
    /// Cap on buffered request bodies
    pub body_limit: usize,
}

/// A method bound to a callback, plus the route's socket manager
pub struct RouteHandler {
    method: RouteMethod,
    callback: RouteCallback,
    sockets: Arc<SocketManager>,
    socket_config: SocketConfig,
}

impl RouteHandler {
    /// Bind an HTTP callback
    pub fn http<F, Fut>(method: RouteMethod, callback: F) -> Self
    where
        F: Fn(RequestCtx, ResponseCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResult<()>> + Send + 'static,
    {
        Self {
            method,
            callback: RouteCallback::Http(Arc::new(move |req, res| Box::pin(callback(req, res)))),
            sockets: Arc::new(SocketManager::new()),
            socket_config: SocketConfig::default(),
        }
    }

    /// Bind a WebSocket callback
    pub fn ws<F, Fut>(callback: F) -> Self
    where
        F: Fn(Arc<WsConnection>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            method: RouteMethod::Ws,
            callback: RouteCallback::Ws(Arc::new(move |conn| Box::pin(callback(conn)))),
            sockets: Arc::new(SocketManager::new()),
            socket_config: SocketConfig::default(),
        }
    }

    /// Bind an already-shared callback (used when workers rebuild their
    /// route trees from one registration)
    pub fn from_callback(method: RouteMethod, callback: RouteCallback) -> Self {
        Self {
            method,
            callback,
            sockets: Arc::new(SocketManager::new()),
            socket_config: SocketConfig::default(),
        }
    }

    /// Override the upgrade-time protocol limits
    pub fn with_socket_config(mut self, config: SocketConfig) -> Self {
        self.socket_config = config;
        self
    }

    /// The bound method
    pub fn method(&self) -> RouteMethod {
        self.method
    }

    /// Whether this binding carries a WS callback
    pub fn is_ws(&self) -> bool {
        matches!(self.callback, RouteCallback::Ws(_))
    }

    /// This route's socket manager
    pub fn sockets(&self) -> &Arc<SocketManager> {
        &self.sockets
    }

    /// Run the pipeline for one matched request
    pub async fn dispatch(
        &self,
        request: Request<Body>,
        params: HashMap<String, String>,
        middlewares: &MiddlewarePipeline,
        env: DispatchEnv,
    ) -> Response {
        let (mut parts, body) = request.into_parts();

        let is_upgrade = parts
            .headers
            .get(header::CONNECTION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().eq_ignore_ascii_case("upgrade"))
            .unwrap_or(false);

        // Upgrade requests carry no body worth buffering.
        let body_bytes = if is_upgrade {
            Bytes::new()
        } else {
            match axum::body::to_bytes(body, env.body_limit).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(error = %e, "failed to buffer request body");
                    return plain_status(StatusCode::PAYLOAD_TOO_LARGE);
                }
            }
        };

        let req = RequestCtx::new(
            parts.method.clone(),
            parts.uri.clone(),
            parts.headers.clone(),
            params,
            body_bytes,
        );
        let res = ResponseCtx::new();

        if !middlewares.run(&req, &res).await {
            return res.into_response().await;
        }

        if req.effective_method() != Some(self.method) {
            res.status(StatusCode::NOT_FOUND).await;
            res.close().await;
            return res.into_response().await;
        }

        match &self.callback {
            RouteCallback::Ws(callback) if env.ws_role => {
                let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
                    Ok(upgrade) => upgrade,
                    Err(rejection) => {
                        debug!(error = %rejection, "websocket upgrade rejected");
                        res.status(StatusCode::BAD_REQUEST).await;
                        res.close().await;
                        return res.into_response().await;
                    }
                };
                let mut upgrade = upgrade;
                if let Some(max) = self.socket_config.max_message_size {
                    upgrade = upgrade.max_message_size(max);
                }
                if let Some(max) = self.socket_config.max_frame_size {
                    upgrade = upgrade.max_frame_size(max);
                }
                let manager = self.sockets.clone();
                let callback = callback.clone();
                upgrade.on_upgrade(move |socket| run_socket(socket, manager, callback))
            }
            RouteCallback::Ws(_) => {
                // A WS-bound route reached through a worker that does not
                // serve the WS role; only the WS listener upgrades.
                res.status(StatusCode::NOT_FOUND).await;
                res.close().await;
                res.into_response().await
            }
            RouteCallback::Http(callback) => {
                if env.ws_only {
                    res.status(StatusCode::BAD_REQUEST).await;
                    res.close().await;
                    return res.into_response().await;
                }
                if let Err(e) = callback(req, res.clone()).await {
                    error!(error = %e, "handler failed");
                    if !res.is_closed().await {
                        res.status(StatusCode::INTERNAL_SERVER_ERROR).await;
                        res.close().await;
                    }
                }
                res.close().await;
                res.into_response().await
            }
        }
    }
}

impl std::fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_ws() { "ws" } else { "http" };
        f.debug_struct("RouteHandler")
            .field("method", &self.method)
            .field("kind", &kind)
            .finish()
    }
}

fn plain_status(status: StatusCode) -> Response {
    Response::builder()
        .status(status)
        .body(Body::empty())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn env() -> DispatchEnv {
        DispatchEnv {
            ws_role: true,
            ws_only: false,
            body_limit: 1024 * 1024,
        }
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn http_dispatch_runs_the_handler() {
        let handler = RouteHandler::http(RouteMethod::Get, |_req, res: ResponseCtx| async move {
            res.send("Hello World!").await;
            res.close().await;
            Ok(())
        });
        let response = handler
            .dispatch(get("/"), HashMap::new(), &MiddlewarePipeline::new(), env())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Hello World!");
    }

    #[tokio::test]
    async fn params_reach_the_handler() {
        let handler = RouteHandler::http(RouteMethod::Get, |req: RequestCtx, res: ResponseCtx| async move {
            let id = req.param("id").unwrap_or("?").to_string();
            res.send(format!("u:{id}")).await;
            res.close().await;
            Ok(())
        });
        let params = HashMap::from([("id".to_string(), "42".to_string())]);
        let response = handler
            .dispatch(get("/user/42"), params, &MiddlewarePipeline::new(), env())
            .await;
        assert_eq!(body_text(response).await, "u:42");
    }

    #[tokio::test]
    async fn method_mismatch_responds_not_found() {
        let handler = RouteHandler::http(RouteMethod::Post, |_req, res: ResponseCtx| async move {
            res.close().await;
            Ok(())
        });
        let response = handler
            .dispatch(get("/submit"), HashMap::new(), &MiddlewarePipeline::new(), env())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upgrade_request_on_http_route_responds_not_found() {
        let handler = RouteHandler::http(RouteMethod::Get, |_req, res: ResponseCtx| async move {
            res.close().await;
            Ok(())
        });
        let request = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header(header::CONNECTION, "Upgrade")
            .body(Body::empty())
            .unwrap();
        let response = handler
            .dispatch(request, HashMap::new(), &MiddlewarePipeline::new(), env())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn plain_request_on_ws_route_responds_not_found() {
        let handler = RouteHandler::ws(|_conn| async {});
        let response = handler
            .dispatch(get("/live"), HashMap::new(), &MiddlewarePipeline::new(), env())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ws_only_worker_rejects_plain_requests_with_bad_request() {
        let handler = RouteHandler::http(RouteMethod::Get, |_req, res: ResponseCtx| async move {
            res.close().await;
            Ok(())
        });
        let ws_env = DispatchEnv {
            ws_role: true,
            ws_only: true,
            body_limit: 1024,
        };
        let response = handler
            .dispatch(get("/"), HashMap::new(), &MiddlewarePipeline::new(), ws_env)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn failing_handler_forces_internal_error() {
        let handler = RouteHandler::http(RouteMethod::Get, |_req, _res| async move {
            Err(crate::errors::HttpError::internal("boom"))
        });
        let response = handler
            .dispatch(get("/"), HashMap::new(), &MiddlewarePipeline::new(), env())
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn failing_handler_keeps_an_already_closed_response() {
        let handler = RouteHandler::http(RouteMethod::Get, |_req, res: ResponseCtx| async move {
            res.status(StatusCode::ACCEPTED).await;
            res.close().await;
            Err(crate::errors::HttpError::internal("after close"))
        });
        let response = handler
            .dispatch(get("/"), HashMap::new(), &MiddlewarePipeline::new(), env())
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn handler_without_close_still_flushes() {
        let handler = RouteHandler::http(RouteMethod::Get, |_req, res: ResponseCtx| async move {
            res.send("implicit").await;
            Ok(())
        });
        let response = handler
            .dispatch(get("/"), HashMap::new(), &MiddlewarePipeline::new(), env())
            .await;
        assert_eq!(body_text(response).await, "implicit");
    }

    #[tokio::test]
    async fn upgrade_without_handshake_headers_is_bad_request() {
        let handler = RouteHandler::ws(|_conn| async {});
        // Connection: upgrade alone is not a complete WebSocket handshake.
        let request = Request::builder()
            .method(Method::GET)
            .uri("/live")
            .header(header::CONNECTION, "upgrade")
            .body(Body::empty())
            .unwrap();
        let response = handler
            .dispatch(request, HashMap::new(), &MiddlewarePipeline::new(), env())
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
