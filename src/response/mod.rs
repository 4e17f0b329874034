//! Response construction
//!
//! `ResponseCtx` is a shared-handle response builder: middlewares and the
//! handler mutate the same underlying state. `close` is idempotent; the
//! first call freezes the response and runs the dispose callback, and
//! later mutations are ignored.

pub mod cookie;

pub use cookie::{SameSite, SetCookie};

use crate::mime;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::io::ReaderStream;
use tracing::debug;

#[derive(Debug)]
enum ResponseBody {
    Empty,
    Bytes(Bytes),
    File(PathBuf),
}

type DisposeFn = Box<dyn FnOnce() + Send + Sync + 'static>;

struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    cookies: Vec<SetCookie>,
    body: ResponseBody,
    closed: bool,
    dispose: Option<DisposeFn>,
}

/// Shared-handle response builder
#[derive(Clone)]
pub struct ResponseCtx {
    inner: Arc<RwLock<ResponseState>>,
}

impl ResponseCtx {
    /// Create an empty 200 response
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ResponseState {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                cookies: Vec::new(),
                body: ResponseBody::Empty,
                closed: false,
                dispose: None,
            })),
        }
    }

    /// Install a callback run by the first `close`
    pub async fn on_dispose<F: FnOnce() + Send + Sync + 'static>(&self, callback: F) {
        let mut state = self.inner.write().await;
        state.dispose = Some(Box::new(callback));
    }

    /// Set the response status
    pub async fn status(&self, status: StatusCode) {
        let mut state = self.inner.write().await;
        if !state.closed {
            state.status = status;
        }
    }

    /// Current response status
    pub async fn status_code(&self) -> StatusCode {
        self.inner.read().await.status
    }

    /// Set a header, replacing any previous value
    pub async fn header(&self, name: &str, value: &str) {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            debug!(name, "dropping invalid response header");
            return;
        };
        let mut state = self.inner.write().await;
        if !state.closed {
            state.headers.insert(name, value);
        }
    }

    /// Read back a header set on this response
    pub async fn header_str(&self, name: &str) -> Option<String> {
        let state = self.inner.read().await;
        state
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Queue a `Set-Cookie` header
    pub async fn set_cookie(&self, cookie: SetCookie) {
        let mut state = self.inner.write().await;
        if !state.closed {
            state.cookies.push(cookie);
        }
    }

    /// Set a text body
    pub async fn send<T: Into<String>>(&self, text: T) {
        let mut state = self.inner.write().await;
        if state.closed {
            return;
        }
        if !state.headers.contains_key(header::CONTENT_TYPE) {
            state.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
        }
        state.body = ResponseBody::Bytes(Bytes::from(text.into()));
    }

    /// Set an HTML body
    pub async fn html<T: Into<String>>(&self, markup: T) {
        let mut state = self.inner.write().await;
        if state.closed {
            return;
        }
        state.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        state.body = ResponseBody::Bytes(Bytes::from(markup.into()));
    }

    /// Serialize a JSON body
    pub async fn json<T: serde::Serialize>(&self, value: &T) {
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "failed to serialize response body");
                let mut state = self.inner.write().await;
                if !state.closed {
                    state.status = StatusCode::INTERNAL_SERVER_ERROR;
                    state.body = ResponseBody::Empty;
                }
                return;
            }
        };
        let mut state = self.inner.write().await;
        if state.closed {
            return;
        }
        state.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        state.body = ResponseBody::Bytes(Bytes::from(payload));
    }

    /// Set a raw byte body
    pub async fn bytes(&self, body: Bytes) {
        let mut state = self.inner.write().await;
        if !state.closed {
            state.body = ResponseBody::Bytes(body);
        }
    }

    /// Redirect with a 302 and `Location` header
    pub async fn redirect<T: AsRef<str>>(&self, location: T) {
        let Ok(value) = HeaderValue::from_str(location.as_ref()) else {
            debug!("dropping redirect with invalid location");
            return;
        };
        let mut state = self.inner.write().await;
        if !state.closed {
            state.status = StatusCode::FOUND;
            state.headers.insert(header::LOCATION, value);
        }
    }

    /// Stream a file as the body. A missing file responds 404 and closes.
    pub async fn send_file<P: Into<PathBuf>>(&self, path: P) {
        let path = path.into();
        let exists = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !exists {
            self.status(StatusCode::NOT_FOUND).await;
            self.close().await;
            return;
        }
        let mut state = self.inner.write().await;
        if state.closed {
            return;
        }
        if !state.headers.contains_key(header::CONTENT_TYPE) {
            state.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(mime::from_path(&path)),
            );
        }
        state.body = ResponseBody::File(path);
    }

    /// Freeze the response. Only the first call runs the dispose
    /// callback; later calls and later mutations are no-ops.
    pub async fn close(&self) {
        let dispose = {
            let mut state = self.inner.write().await;
            if state.closed {
                return;
            }
            state.closed = true;
            state.dispose.take()
        };
        if let Some(dispose) = dispose {
            dispose();
        }
    }

    /// Whether `close` has been called
    pub async fn is_closed(&self) -> bool {
        self.inner.read().await.closed
    }

    /// Convert the built state into a wire response
    pub async fn into_response(self) -> Response {
        let mut state = self.inner.write().await;
        let mut builder = Response::builder().status(state.status);
        if let Some(headers) = builder.headers_mut() {
            std::mem::swap(headers, &mut state.headers);
            for cookie in state.cookies.drain(..) {
                if let Ok(value) = HeaderValue::from_str(&cookie.header_value()) {
                    headers.append(header::SET_COOKIE, value);
                }
            }
        }

        let body = match std::mem::replace(&mut state.body, ResponseBody::Empty) {
            ResponseBody::Empty => Body::empty(),
            ResponseBody::Bytes(bytes) => Body::from(bytes),
            ResponseBody::File(path) => match tokio::fs::File::open(&path).await {
                Ok(file) => Body::from_stream(ReaderStream::new(file)),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "file vanished before streaming");
                    return Response::builder()
                        .status(StatusCode::NOT_FOUND)
                        .body(Body::empty())
                        .unwrap_or_default();
                }
            },
        };

        builder.body(body).unwrap_or_else(|e| {
            debug!(error = %e, "failed to assemble response");
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .unwrap_or_default()
        })
    }
}

impl Default for ResponseCtx {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn close_is_idempotent_and_runs_dispose_once() {
        let res = ResponseCtx::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        res.on_dispose(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        res.close().await;
        res.close().await;
        assert!(res.is_closed().await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mutation_after_close_is_ignored() {
        let res = ResponseCtx::new();
        res.send("first").await;
        res.close().await;
        res.status(StatusCode::IM_A_TEAPOT).await;
        res.send("second").await;

        assert_eq!(res.status_code().await, StatusCode::OK);
        let response = res.into_response().await;
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"first");
    }

    #[tokio::test]
    async fn text_body_defaults_content_type() {
        let res = ResponseCtx::new();
        res.send("hi").await;
        let response = res.into_response().await;
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn cookies_append_as_set_cookie_headers() {
        let res = ResponseCtx::new();
        res.set_cookie(SetCookie::new("a", "1")).await;
        res.set_cookie(SetCookie::new("b", "2").http_only()).await;
        let response = res.into_response().await;
        let cookies: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies, vec!["a=1", "b=2; HttpOnly"]);
    }

    #[tokio::test]
    async fn missing_file_responds_not_found_and_closes() {
        let res = ResponseCtx::new();
        res.send_file("/definitely/not/here.txt").await;
        assert!(res.is_closed().await);
        assert_eq!(res.status_code().await, StatusCode::NOT_FOUND);
    }
}
