//! The server: route registration and the listen entry point
//!
//! Routes and middlewares are registered once; at `listen` time each
//! worker rebuilds its own `RouteTree` from the shared registrations,
//! so handler callbacks are shared while route state (notably each WS
//! route's `SocketManager`) stays worker-local.

use super::listener;
use crate::config::{ServerConfig, ServerMode};
use crate::errors::{HttpResult, ServerError, ServerResult};
use crate::logging;
use crate::middleware::{Middleware, MiddlewarePipeline};
use crate::request::RequestCtx;
use crate::response::ResponseCtx;
use crate::routing::{
    DispatchEnv, HttpCallback, RouteCallback, RouteHandler, RouteMethod, RouteTree,
};
use crate::static_files::StaticDir;
use crate::tls;
use crate::websocket::{SocketConfig, WsCallback, WsConnection};
use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

/// One registered route, shared by every worker
struct RouteBinding {
    method: RouteMethod,
    pattern: String,
    callback: RouteCallback,
    socket_config: SocketConfig,
}

/// Everything one worker's dispatch loop needs
#[derive(Clone)]
pub(crate) struct WorkerState {
    pub tree: Arc<RouteTree>,
    pub middlewares: Arc<MiddlewarePipeline>,
    pub static_dir: Option<Arc<StaticDir>>,
    pub env: DispatchEnv,
}

/// HTTP + WebSocket server
pub struct Server {
    config: ServerConfig,
    routes: Vec<RouteBinding>,
    middlewares: MiddlewarePipeline,
    static_dir: Option<StaticDir>,
}

impl Server {
    /// Create a server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            routes: Vec::new(),
            middlewares: MiddlewarePipeline::new(),
            static_dir: None,
        }
    }

    /// Create a server configured from `PORTICO_*` environment variables
    pub fn from_env() -> ServerResult<Self> {
        Ok(Self::new(ServerConfig::from_env()?))
    }

    /// The active configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Register an HTTP route
    pub fn route<F, Fut>(&mut self, method: RouteMethod, pattern: &str, callback: F) -> &mut Self
    where
        F: Fn(RequestCtx, ResponseCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResult<()>> + Send + 'static,
    {
        let callback: HttpCallback = Arc::new(move |req, res| Box::pin(callback(req, res)));
        self.routes.push(RouteBinding {
            method,
            pattern: pattern.to_string(),
            callback: RouteCallback::Http(callback),
            socket_config: SocketConfig::default(),
        });
        self
    }

    /// Register a GET route
    pub fn get<F, Fut>(&mut self, pattern: &str, callback: F) -> &mut Self
    where
        F: Fn(RequestCtx, ResponseCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResult<()>> + Send + 'static,
    {
        self.route(RouteMethod::Get, pattern, callback)
    }

    /// Register a POST route
    pub fn post<F, Fut>(&mut self, pattern: &str, callback: F) -> &mut Self
    where
        F: Fn(RequestCtx, ResponseCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResult<()>> + Send + 'static,
    {
        self.route(RouteMethod::Post, pattern, callback)
    }

    /// Register a PUT route
    pub fn put<F, Fut>(&mut self, pattern: &str, callback: F) -> &mut Self
    where
        F: Fn(RequestCtx, ResponseCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResult<()>> + Send + 'static,
    {
        self.route(RouteMethod::Put, pattern, callback)
    }

    /// Register a DELETE route
    pub fn delete<F, Fut>(&mut self, pattern: &str, callback: F) -> &mut Self
    where
        F: Fn(RequestCtx, ResponseCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResult<()>> + Send + 'static,
    {
        self.route(RouteMethod::Delete, pattern, callback)
    }

    /// Register a PATCH route
    pub fn patch<F, Fut>(&mut self, pattern: &str, callback: F) -> &mut Self
    where
        F: Fn(RequestCtx, ResponseCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResult<()>> + Send + 'static,
    {
        self.route(RouteMethod::Patch, pattern, callback)
    }

    /// Register an OPTIONS route
    pub fn options<F, Fut>(&mut self, pattern: &str, callback: F) -> &mut Self
    where
        F: Fn(RequestCtx, ResponseCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResult<()>> + Send + 'static,
    {
        self.route(RouteMethod::Options, pattern, callback)
    }

    /// Register a HEAD route
    pub fn head<F, Fut>(&mut self, pattern: &str, callback: F) -> &mut Self
    where
        F: Fn(RequestCtx, ResponseCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HttpResult<()>> + Send + 'static,
    {
        self.route(RouteMethod::Head, pattern, callback)
    }

    /// Register a WebSocket route; the callback receives each upgraded
    /// connection
    pub fn ws<F, Fut>(&mut self, pattern: &str, callback: F) -> &mut Self
    where
        F: Fn(Arc<WsConnection>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.ws_with_config(pattern, SocketConfig::default(), callback)
    }

    /// Register a WebSocket route with custom protocol limits
    pub fn ws_with_config<F, Fut>(
        &mut self,
        pattern: &str,
        socket_config: SocketConfig,
        callback: F,
    ) -> &mut Self
    where
        F: Fn(Arc<WsConnection>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: WsCallback = Arc::new(move |conn| Box::pin(callback(conn)));
        self.routes.push(RouteBinding {
            method: RouteMethod::Ws,
            pattern: pattern.to_string(),
            callback: RouteCallback::Ws(callback),
            socket_config,
        });
        self
    }

    /// Append a middleware; middlewares run in registration order
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middlewares.add(middleware);
        self
    }

    /// Serve files from a directory below unmatched routes
    pub fn serve_static(&mut self, dir: StaticDir) -> &mut Self {
        self.static_dir = Some(dir);
        self
    }

    fn has_ws_routes(&self) -> bool {
        self.routes
            .iter()
            .any(|binding| matches!(binding.callback, RouteCallback::Ws(_)))
    }

    /// Rebuild a route tree from the shared registrations; called once
    /// per worker so each WS route gets a fresh `SocketManager` there
    fn build_tree(routes: &[RouteBinding]) -> RouteTree {
        let mut tree = RouteTree::new();
        for binding in routes {
            let handler = RouteHandler::from_callback(binding.method, binding.callback.clone())
                .with_socket_config(binding.socket_config);
            tree.insert(&binding.pattern, handler);
        }
        tree
    }

    fn resolve_addr(host: &str, port: u16) -> ServerResult<SocketAddr> {
        let display = format!("{host}:{port}");
        (host, port)
            .to_socket_addrs()
            .map_err(|e| ServerError::InvalidAddress {
                addr: display.clone(),
                message: e.to_string(),
            })?
            .next()
            .ok_or(ServerError::InvalidAddress {
                addr: display,
                message: "no addresses resolved".to_string(),
            })
    }

    /// Validate, bind, and serve until shutdown. Configuration, bind
    /// and TLS failures return synchronously and nothing starts.
    pub async fn listen(mut self) -> ServerResult<()> {
        self.config.validate()?;

        if let Some(path) = self.config.health_check_path.clone() {
            self.get(&path, |_req, res| async move {
                res.json(&serde_json::json!({"status": "ok"})).await;
                res.close().await;
                Ok(())
            });
        }

        let has_ws = self.has_ws_routes();
        if self.config.mode == ServerMode::Performance {
            if self.config.ws_port == Some(self.config.port) {
                return Err(ServerError::SamePort {
                    port: self.config.port,
                });
            }
            if has_ws && self.config.ws_port.is_none() {
                return Err(ServerError::WsPortRequired);
            }
        }

        let addr = Self::resolve_addr(&self.config.host, self.config.port)?;
        let tls = tls::acceptor_from_config(&self.config)?;
        let body_limit = self.config.max_request_size;

        let routes = Arc::new(self.routes);
        let middlewares = Arc::new(self.middlewares);
        let static_dir = self.static_dir.map(Arc::new);

        let make_state = {
            let routes = routes.clone();
            let middlewares = middlewares.clone();
            let static_dir = static_dir.clone();
            move |env: DispatchEnv| WorkerState {
                tree: Arc::new(Self::build_tree(&routes)),
                middlewares: middlewares.clone(),
                static_dir: static_dir.clone(),
                env,
            }
        };

        match self.config.mode {
            ServerMode::Compatibility => {
                let env = DispatchEnv {
                    ws_role: true,
                    ws_only: false,
                    body_limit,
                };
                let listener = listener::bind_shared(addr)?;
                logging::log_startup_info(&self.config, 1, false);
                listener::serve(listener, make_state(env), tls, true).await?;
            }
            ServerMode::Performance => {
                let parallelism = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(2);
                // Half the cores, one of them reserved for the WS
                // listener when WS routes exist. Both counts may reach
                // zero; the calling-context listener below always runs.
                let worker_budget = parallelism / 2;
                let spawned_regular = if has_ws {
                    worker_budget.saturating_sub(1)
                } else {
                    worker_budget
                };

                let http_env = DispatchEnv {
                    ws_role: false,
                    ws_only: false,
                    body_limit,
                };
                for index in 0..spawned_regular {
                    let listener = listener::bind_shared(addr)?;
                    let make_state = make_state.clone();
                    listener::spawn_worker(
                        format!("portico-http-{index}"),
                        listener,
                        move || make_state(http_env),
                        tls.clone(),
                    )?;
                }

                // The dedicated WS listener, spawned or kept in-place.
                let mut inline_ws = None;
                if has_ws {
                    let Some(ws_port) = self.config.ws_port else {
                        return Err(ServerError::WsPortRequired);
                    };
                    let ws_addr = SocketAddr::new(addr.ip(), ws_port);
                    let ws_listener = listener::bind_shared(ws_addr)?;
                    let ws_env = DispatchEnv {
                        ws_role: true,
                        ws_only: true,
                        body_limit,
                    };
                    if self.config.use_websocket_in_main_thread {
                        inline_ws = Some((ws_listener, ws_env));
                    } else {
                        let make_state = make_state.clone();
                        listener::spawn_worker(
                            "portico-ws".to_string(),
                            ws_listener,
                            move || make_state(ws_env),
                            tls.clone(),
                        )?;
                    }
                }

                let listener = listener::bind_shared(addr)?;
                logging::log_startup_info(&self.config, spawned_regular + 1, has_ws);

                match inline_ws {
                    Some((ws_listener, ws_env)) => {
                        let ws_state = make_state(ws_env);
                        let http_state = make_state(http_env);
                        let (http_result, ws_result) = tokio::join!(
                            listener::serve(listener, http_state, tls.clone(), true),
                            listener::serve(ws_listener, ws_state, tls, true),
                        );
                        http_result?;
                        ws_result?;
                    }
                    None => {
                        listener::serve(listener, make_state(http_env), tls, true).await?;
                    }
                }
            }
        }

        logging::log_shutdown_info();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_handler() -> impl Fn(RequestCtx, ResponseCtx) -> futures_util::future::BoxFuture<'static, HttpResult<()>>
           + Send
           + Sync
           + 'static {
        |_req, res| {
            Box::pin(async move {
                res.close().await;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn performance_mode_rejects_equal_ports() {
        let config = ServerConfig {
            port: 8080,
            ws_port: Some(8080),
            ..Default::default()
        };
        let server = Server::new(config);
        assert!(matches!(
            server.listen().await,
            Err(ServerError::SamePort { port: 8080 })
        ));
    }

    #[tokio::test]
    async fn performance_mode_requires_ws_port_for_ws_routes() {
        let mut server = Server::new(ServerConfig::default());
        server.ws("/live", |_conn| async {});
        assert!(matches!(
            server.listen().await,
            Err(ServerError::WsPortRequired)
        ));
    }

    #[tokio::test]
    async fn compatibility_mode_needs_no_ws_port() {
        let config = ServerConfig {
            mode: ServerMode::Compatibility,
            host: "definitely-not-a-real-host.invalid".to_string(),
            ..Default::default()
        };
        let mut server = Server::new(config);
        server.ws("/live", |_conn| async {});
        // No SamePort/WsPortRequired; the bogus host fails at resolution,
        // which proves validation passed.
        assert!(matches!(
            server.listen().await,
            Err(ServerError::InvalidAddress { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_config_fails_before_binding() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        let server = Server::new(config);
        assert!(matches!(
            server.listen().await,
            Err(ServerError::Config { .. })
        ));
    }

    #[test]
    fn registration_collects_routes() {
        let mut server = Server::new(ServerConfig::default());
        server.get("/", quiet_handler());
        server.post("/submit", quiet_handler());
        server.ws("/live", |_conn| async {});
        assert_eq!(server.routes.len(), 3);
        assert!(server.has_ws_routes());
    }

    #[test]
    fn built_trees_have_independent_socket_managers() {
        let mut server = Server::new(ServerConfig::default());
        server.ws("/live", |_conn| async {});
        let routes = std::mem::take(&mut server.routes);

        let first = Server::build_tree(&routes);
        let second = Server::build_tree(&routes);
        let (a, _) = first.lookup("/live").unwrap();
        let (b, _) = second.lookup("/live").unwrap();
        assert!(!Arc::ptr_eq(a.sockets(), b.sockets()));
    }
}
