//! Per-connection event dispatch
//!
//! Every connection owns one notifier holding its registered callbacks:
//! raw message observers, open/close/error observers, and named-event
//! handlers. When a text frame decodes as a `{"type": …, "data": …}`
//! envelope it is additionally delivered to the handlers registered for
//! that type; decode failures are swallowed for typed dispatch while the
//! raw observers still fire.

use super::types::{EventEnvelope, SocketError, SocketMessage, SocketResult};
use crate::middleware::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

type MessageCallback = Arc<dyn Fn(SocketMessage) -> BoxFuture<()> + Send + Sync>;
type VoidCallback = Arc<dyn Fn() -> BoxFuture<()> + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(String) -> BoxFuture<()> + Send + Sync>;
type EventCallback = Arc<dyn Fn(serde_json::Value) -> BoxFuture<()> + Send + Sync>;

#[derive(Default)]
struct NotifierState {
    message: Vec<MessageCallback>,
    open: Vec<VoidCallback>,
    close: Vec<VoidCallback>,
    error: Vec<ErrorCallback>,
    events: HashMap<String, Vec<EventCallback>>,
    disposed: bool,
}

/// Callback registry and dispatcher for one connection
#[derive(Default)]
pub struct SocketNotifier {
    state: Mutex<NotifierState>,
}

impl SocketNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn register<T>(&self, apply: impl FnOnce(&mut NotifierState) -> T) -> SocketResult<T> {
        let mut state = self.state.lock().expect("notifier lock poisoned");
        if state.disposed {
            return Err(SocketError::Closed);
        }
        Ok(apply(&mut state))
    }

    /// Observe every incoming message
    pub fn on_message<F, Fut>(&self, callback: F) -> SocketResult<()>
    where
        F: Fn(SocketMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: MessageCallback = Arc::new(move |msg| Box::pin(callback(msg)));
        self.register(|state| state.message.push(callback))
    }

    /// Observe the open event
    pub fn on_open<F, Fut>(&self, callback: F) -> SocketResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: VoidCallback = Arc::new(move || Box::pin(callback()));
        self.register(|state| state.open.push(callback))
    }

    /// Observe the close event
    pub fn on_close<F, Fut>(&self, callback: F) -> SocketResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: VoidCallback = Arc::new(move || Box::pin(callback()));
        self.register(|state| state.close.push(callback))
    }

    /// Observe transport errors
    pub fn on_error<F, Fut>(&self, callback: F) -> SocketResult<()>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: ErrorCallback = Arc::new(move |err| Box::pin(callback(err)));
        self.register(|state| state.error.push(callback))
    }

    /// Handle a named event decoded from the typed-event envelope
    pub fn on<E, F, Fut>(&self, event: E, callback: F) -> SocketResult<()>
    where
        E: Into<String>,
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: EventCallback = Arc::new(move |data| Box::pin(callback(data)));
        self.register(|state| {
            state.events.entry(event.into()).or_default().push(callback)
        })
    }

    /// Deliver an incoming message: raw observers first, then typed
    /// handlers when the text decodes as an event envelope
    pub async fn notify_message(&self, message: SocketMessage) {
        let (raw, typed) = {
            let state = self.state.lock().expect("notifier lock poisoned");
            if state.disposed {
                return;
            }
            let raw = state.message.clone();
            let typed = message
                .as_text()
                .and_then(|text| serde_json::from_str::<EventEnvelope>(text).ok())
                .and_then(|envelope| {
                    state
                        .events
                        .get(&envelope.event)
                        .map(|handlers| (handlers.clone(), envelope.data))
                });
            (raw, typed)
        };

        for callback in raw {
            callback(message.clone()).await;
        }
        if let Some((handlers, data)) = typed {
            for callback in handlers {
                callback(data.clone()).await;
            }
        }
    }

    /// Fire the open observers
    pub async fn notify_open(&self) {
        let callbacks = {
            let state = self.state.lock().expect("notifier lock poisoned");
            if state.disposed {
                return;
            }
            state.open.clone()
        };
        for callback in callbacks {
            callback().await;
        }
    }

    /// Fire the error observers
    pub async fn notify_error(&self, message: String) {
        let callbacks = {
            let state = self.state.lock().expect("notifier lock poisoned");
            if state.disposed {
                return;
            }
            state.error.clone()
        };
        for callback in callbacks {
            callback(message.clone()).await;
        }
    }

    /// Fire the close observers once, then clear every callback list and
    /// mark the notifier disposed; later registrations fail
    pub async fn notify_close(&self) {
        let callbacks = {
            let mut state = self.state.lock().expect("notifier lock poisoned");
            if state.disposed {
                return;
            }
            state.disposed = true;
            let callbacks = state.close.clone();
            state.message.clear();
            state.open.clear();
            state.close.clear();
            state.error.clear();
            state.events.clear();
            callbacks
        };
        for callback in callbacks {
            callback().await;
        }
    }

    /// Whether the notifier has been disposed
    pub fn is_disposed(&self) -> bool {
        self.state.lock().expect("notifier lock poisoned").disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)))
    }

    #[tokio::test]
    async fn typed_event_reaches_both_raw_and_named_handlers() {
        let notifier = SocketNotifier::new();
        let (raw_count, typed_count) = counter();

        let raw = raw_count.clone();
        notifier
            .on_message(move |msg| {
                let raw = raw.clone();
                async move {
                    assert_eq!(msg.as_text(), Some(r#"{"type":"greet","data":"hi"}"#));
                    raw.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        let typed = typed_count.clone();
        notifier
            .on("greet", move |data| {
                let typed = typed.clone();
                async move {
                    assert_eq!(data, json!("hi"));
                    typed.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        notifier
            .notify_message(SocketMessage::text(r#"{"type":"greet","data":"hi"}"#))
            .await;
        assert_eq!(raw_count.load(Ordering::SeqCst), 1);
        assert_eq!(typed_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_json_message_only_fires_raw_handlers() {
        let notifier = SocketNotifier::new();
        let (raw_count, typed_count) = counter();

        let raw = raw_count.clone();
        notifier
            .on_message(move |_| {
                let raw = raw.clone();
                async move {
                    raw.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
        let typed = typed_count.clone();
        notifier
            .on("greet", move |_| {
                let typed = typed.clone();
                async move {
                    typed.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        notifier
            .notify_message(SocketMessage::text("plain text"))
            .await;
        assert_eq!(raw_count.load(Ordering::SeqCst), 1);
        assert_eq!(typed_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unregistered_event_type_is_ignored() {
        let notifier = SocketNotifier::new();
        let (_, typed_count) = counter();
        let typed = typed_count.clone();
        notifier
            .on("greet", move |_| {
                let typed = typed.clone();
                async move {
                    typed.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
        notifier
            .notify_message(SocketMessage::text(r#"{"type":"other","data":null}"#))
            .await;
        assert_eq!(typed_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn close_fires_once_and_disposes() {
        let notifier = SocketNotifier::new();
        let (close_count, _) = counter();
        let close = close_count.clone();
        notifier
            .on_close(move || {
                let close = close.clone();
                async move {
                    close.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();

        notifier.notify_close().await;
        notifier.notify_close().await;
        assert_eq!(close_count.load(Ordering::SeqCst), 1);
        assert!(notifier.is_disposed());
        assert!(matches!(
            notifier.on_message(|_| async {}),
            Err(SocketError::Closed)
        ));
    }
}
