//! Middleware chain with short-circuit semantics
//!
//! A middleware inspects the request and the in-progress response and
//! returns `true` to continue or `false` to stop the chain. A stopping
//! middleware owns the response it leaves behind; the handler is never
//! invoked after a stop.

pub mod cors;
pub mod security_headers;

use crate::request::RequestCtx;
use crate::response::ResponseCtx;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Boxed future used across the dispatch pipeline
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// A request-stage function returning continue (`true`) or stop (`false`)
pub trait Middleware: Send + Sync {
    /// Inspect the request, optionally write to the response, and decide
    /// whether the chain continues
    fn handle(&self, req: RequestCtx, res: ResponseCtx) -> BoxFuture<bool>;

    /// Name used in logs
    fn name(&self) -> &'static str {
        "middleware"
    }
}

/// Adapter turning an async closure into a [`Middleware`]
pub struct MiddlewareFn<F> {
    func: F,
}

impl<F, Fut> MiddlewareFn<F>
where
    F: Fn(RequestCtx, ResponseCtx) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> Middleware for MiddlewareFn<F>
where
    F: Fn(RequestCtx, ResponseCtx) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    fn handle(&self, req: RequestCtx, res: ResponseCtx) -> BoxFuture<bool> {
        Box::pin((self.func)(req, res))
    }
}

/// Ordered middleware list executed ahead of every handler
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a middleware
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.stages.push(Arc::new(middleware));
    }

    /// Append an already-shared middleware
    pub fn add_shared(&mut self, middleware: Arc<dyn Middleware>) {
        self.stages.push(middleware);
    }

    /// Run the chain in registration order. Returns `false` as soon as a
    /// stage stops it.
    pub async fn run(&self, req: &RequestCtx, res: &ResponseCtx) -> bool {
        for stage in &self.stages {
            if !stage.handle(req.clone(), res.clone()).await {
                debug!(middleware = stage.name(), "middleware stopped the chain");
                return false;
            }
        }
        true
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether no middleware is registered
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
