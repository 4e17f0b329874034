//! Socket binding and per-worker serving
//!
//! Every worker gets its own listener on the same address via
//! `SO_REUSEPORT`, so the kernel load-balances `accept` across workers.
//! A worker runs a single-threaded tokio runtime and owns its route
//! tree and socket managers outright; workers share no heap state.

use super::server::WorkerState;
use crate::errors::{ServerError, ServerResult};
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::signal;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

/// Bind a non-blocking listener with the shared-socket options set, so
/// several workers can sit on one address
pub(crate) fn bind_shared(addr: SocketAddr) -> ServerResult<std::net::TcpListener> {
    let bind_err = |source| ServerError::Bind { addr, source };

    let socket =
        Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP)).map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    #[cfg(unix)]
    socket.set_reuse_port(true).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.listen(1024).map_err(bind_err)?;
    Ok(socket.into())
}

/// Spawn one worker thread around an already-bound listener. The state
/// builder runs inside the thread so the worker's route tree and socket
/// managers are created on, and never leave, that worker.
pub(crate) fn spawn_worker<F>(
    name: String,
    listener: std::net::TcpListener,
    build_state: F,
    tls: Option<TlsAcceptor>,
) -> ServerResult<()>
where
    F: FnOnce() -> WorkerState + Send + 'static,
{
    let worker_name = name.clone();
    std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build();
            match runtime {
                Ok(runtime) => {
                    if let Err(e) = runtime.block_on(serve(listener, build_state(), tls, false)) {
                        error!(worker = %worker_name, error = %e, "worker exited with error");
                    }
                }
                Err(e) => error!(worker = %worker_name, error = %e, "failed to build worker runtime"),
            }
        })
        .map_err(|e| ServerError::worker(format!("failed to spawn {name}: {e}")))?;
    Ok(())
}

/// Run one accept loop to completion
pub(crate) async fn serve(
    listener: std::net::TcpListener,
    state: WorkerState,
    tls: Option<TlsAcceptor>,
    graceful: bool,
) -> ServerResult<()> {
    let addr = listener.local_addr().ok();
    let listener = tokio::net::TcpListener::from_std(listener).map_err(|e| {
        ServerError::worker(format!("failed to register listener with the runtime: {e}"))
    })?;
    info!(addr = ?addr, ws_only = state.env.ws_only, "listener ready");

    let router = Router::new()
        .fallback(dispatch_request)
        .with_state(state);

    match tls {
        None => serve_plain(listener, router, graceful).await,
        Some(acceptor) => serve_tls(listener, router, acceptor, graceful).await,
    }
}

async fn serve_plain(
    listener: tokio::net::TcpListener,
    router: Router,
    graceful: bool,
) -> ServerResult<()> {
    let serving = axum::serve(listener, router.into_make_service());
    let result = if graceful {
        serving.with_graceful_shutdown(shutdown_signal()).await
    } else {
        serving.await
    };
    result.map_err(|e| ServerError::worker(format!("serve loop failed: {e}")))
}

/// TLS accept loop: handshake per connection, then hand the stream to
/// hyper with upgrade support so WebSockets work over TLS too
async fn serve_tls(
    listener: tokio::net::TcpListener,
    router: Router,
    acceptor: TlsAcceptor,
    graceful: bool,
) -> ServerResult<()> {
    loop {
        let accepted = if graceful {
            tokio::select! {
                _ = shutdown_signal() => return Ok(()),
                accepted = listener.accept() => accepted,
            }
        } else {
            listener.accept().await
        };

        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(router.clone());
        tokio::spawn(async move {
            match acceptor.accept(stream).await {
                Ok(tls_stream) => {
                    let builder = auto::Builder::new(TokioExecutor::new());
                    let connection =
                        builder.serve_connection_with_upgrades(TokioIo::new(tls_stream), service);
                    if let Err(e) = connection.await {
                        debug!(peer = %peer, error = %e, "connection ended with error");
                    }
                }
                Err(e) => debug!(peer = %peer, error = %e, "tls handshake failed"),
            }
        });
    }
}

/// The per-worker catch-all: trie match, then dispatch; unmatched paths
/// fall through to the static handler when one is configured
async fn dispatch_request(
    State(state): State<WorkerState>,
    request: Request<Body>,
) -> Response {
    let path = request.uri().path().to_string();

    if let Some((handler, matched)) = state.tree.lookup(&path) {
        return handler
            .dispatch(request, matched.params, &state.middlewares, state.env)
            .await;
    }

    if let Some(static_dir) = &state.static_dir {
        if matches!(*request.method(), Method::GET | Method::HEAD) {
            if let Some(response) = static_dir.serve(&path).await {
                return response;
            }
        }
    }

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Body::empty())
        .unwrap_or_default()
}

/// Resolve on ctrl-c or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received terminate signal, shutting down"),
    }
}
