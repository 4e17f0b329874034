//! A single WebSocket session
//!
//! `WsConnection` owns the outbound half of one upgraded transport and a
//! `SocketNotifier`; the inbound half is pumped by [`run_socket`]. Room
//! and fan-out operations delegate to the owning `SocketManager`, held
//! only weakly; the manager owns connections, never the reverse.

use super::manager::SocketManager;
use super::notifier::SocketNotifier;
use super::types::{CloseFrame, EventEnvelope, SocketError, SocketMessage, SocketResult};
use axum::extract::ws::WebSocket;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;
use tracing::debug;

// Socket ids are process-wide so two managers never hand out the same id.
static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

fn next_socket_id() -> u64 {
    NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed)
}

/// One live WebSocket session
pub struct WsConnection {
    id: u64,
    sender: mpsc::UnboundedSender<SocketMessage>,
    notifier: SocketNotifier,
    attributes: Mutex<HashMap<String, Value>>,
    disposed: AtomicBool,
    manager: Weak<SocketManager>,
}

impl WsConnection {
    pub(crate) fn new(
        sender: mpsc::UnboundedSender<SocketMessage>,
        manager: Weak<SocketManager>,
    ) -> Self {
        Self {
            id: next_socket_id(),
            sender,
            notifier: SocketNotifier::new(),
            attributes: Mutex::new(HashMap::new()),
            disposed: AtomicBool::new(false),
            manager,
        }
    }

    /// Stable id, distinct for simultaneously-live connections
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this connection has been disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    pub(crate) fn notifier(&self) -> &SocketNotifier {
        &self.notifier
    }

    fn manager(&self) -> SocketResult<Arc<SocketManager>> {
        if self.is_disposed() {
            return Err(SocketError::Closed);
        }
        self.manager.upgrade().ok_or(SocketError::Closed)
    }

    // -- user attributes ---------------------------------------------------

    /// Attach a caller-owned attribute for the connection's lifetime
    pub fn set_attribute<K: Into<String>>(&self, key: K, value: Value) {
        self.attributes
            .lock()
            .expect("attribute lock poisoned")
            .insert(key.into(), value);
    }

    /// Read back a caller-owned attribute
    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.attributes
            .lock()
            .expect("attribute lock poisoned")
            .get(key)
            .cloned()
    }

    // -- outbound ----------------------------------------------------------

    /// Send a raw frame to this peer
    pub fn send(&self, message: SocketMessage) -> SocketResult<()> {
        if self.is_disposed() {
            return Err(SocketError::Closed);
        }
        self.sender.send(message).map_err(|_| SocketError::Closed)
    }

    /// Send a text frame to this peer
    pub fn send_text<T: Into<String>>(&self, text: T) -> SocketResult<()> {
        self.send(SocketMessage::text(text))
    }

    /// Send a typed event `{type, data}` to this peer
    pub fn emit<E: Into<String>>(&self, event: E, data: Value) -> SocketResult<()> {
        self.send(EventEnvelope::new(event, data).into_message()?)
    }

    /// Close the transport, optionally with a code and reason
    pub fn close(&self, frame: Option<CloseFrame>) -> SocketResult<()> {
        self.send(SocketMessage::Close(frame))
    }

    // -- rooms -------------------------------------------------------------

    /// Join a room; returns `true` when the membership is new
    pub async fn join<R: Into<String>>(&self, room: R) -> SocketResult<bool> {
        Ok(self.manager()?.join(self.id, room.into()).await)
    }

    /// Leave a room; returns `true` when the membership existed
    pub async fn leave(&self, room: &str) -> SocketResult<bool> {
        Ok(self.manager()?.leave(self.id, room).await)
    }

    /// Rooms this connection currently belongs to
    pub async fn rooms(&self) -> SocketResult<HashSet<String>> {
        Ok(self.manager()?.rooms_of(self.id).await)
    }

    // -- fan-out -----------------------------------------------------------

    /// Send to every live peer except this one
    pub async fn broadcast(&self, message: SocketMessage) -> SocketResult<()> {
        self.manager()?.send_to_all_except(self.id, message).await;
        Ok(())
    }

    /// Emit a typed event to every live peer except this one
    pub async fn broadcast_event<E: Into<String>>(
        &self,
        event: E,
        data: Value,
    ) -> SocketResult<()> {
        let message = EventEnvelope::new(event, data).into_message()?;
        self.manager()?.send_to_all_except(self.id, message).await;
        Ok(())
    }

    /// Send to every live peer including this one
    pub async fn send_to_all(&self, message: SocketMessage) -> SocketResult<()> {
        self.manager()?.send_to_all(message).await;
        Ok(())
    }

    /// Emit a typed event to every live peer including this one
    pub async fn emit_to_all<E: Into<String>>(&self, event: E, data: Value) -> SocketResult<()> {
        let message = EventEnvelope::new(event, data).into_message()?;
        self.manager()?.send_to_all(message).await;
        Ok(())
    }

    /// Send to every member of a room. The sender receives the message
    /// when it is a member; membership of the sender is not required.
    pub async fn send_to_room(&self, room: &str, message: SocketMessage) -> SocketResult<()> {
        self.manager()?.send_to_room(room, message).await;
        Ok(())
    }

    /// Emit a typed event to every member of a room
    pub async fn emit_to_room<E: Into<String>>(
        &self,
        event: E,
        room: &str,
        data: Value,
    ) -> SocketResult<()> {
        let message = EventEnvelope::new(event, data).into_message()?;
        self.manager()?.send_to_room(room, message).await;
        Ok(())
    }

    /// Send to every member of a room except this connection
    pub async fn broadcast_to_room(&self, room: &str, message: SocketMessage) -> SocketResult<()> {
        self.manager()?
            .send_to_room_except(room, self.id, message)
            .await;
        Ok(())
    }

    /// Emit a typed event to every member of a room except this connection
    pub async fn broadcast_event_to_room<E: Into<String>>(
        &self,
        event: E,
        room: &str,
        data: Value,
    ) -> SocketResult<()> {
        let message = EventEnvelope::new(event, data).into_message()?;
        self.manager()?
            .send_to_room_except(room, self.id, message)
            .await;
        Ok(())
    }

    // -- subscriptions -----------------------------------------------------

    /// Handle a named typed event
    pub fn on<E, F, Fut>(&self, event: E, callback: F) -> SocketResult<()>
    where
        E: Into<String>,
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.notifier.on(event, callback)
    }

    /// Observe every incoming message
    pub fn on_message<F, Fut>(&self, callback: F) -> SocketResult<()>
    where
        F: Fn(SocketMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.notifier.on_message(callback)
    }

    /// Observe the open event
    pub fn on_open<F, Fut>(&self, callback: F) -> SocketResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.notifier.on_open(callback)
    }

    /// Observe the close event
    pub fn on_close<F, Fut>(&self, callback: F) -> SocketResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.notifier.on_close(callback)
    }

    /// Observe transport errors
    pub fn on_error<F, Fut>(&self, callback: F) -> SocketResult<()>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.notifier.on_error(callback)
    }
}

impl std::fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnection")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Callback invoked with each newly upgraded connection
pub type WsCallback =
    Arc<dyn Fn(Arc<WsConnection>) -> crate::middleware::BoxFuture<()> + Send + Sync>;

/// Drive one upgraded socket: register the connection, run the route's
/// WS callback so it can subscribe, fire `open`, then pump frames until
/// the transport ends. Cleanup drops the connection from the manager,
/// which also removes its room memberships.
pub(crate) async fn run_socket(
    socket: WebSocket,
    manager: Arc<SocketManager>,
    callback: WsCallback,
) {
    let (sender, mut outbox) = mpsc::unbounded_channel();
    let connection = Arc::new(WsConnection::new(sender, Arc::downgrade(&manager)));
    let id = connection.id();
    manager.add(connection.clone()).await;
    debug!(socket = id, "websocket session opened");

    callback(connection.clone()).await;
    connection.notifier().notify_open().await;

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(frame)) => {
                    let message = SocketMessage::from(frame);
                    if message.is_close() {
                        break;
                    }
                    // Pings are answered by the transport layer.
                    if !message.is_control() {
                        connection.notifier().notify_message(message).await;
                    }
                }
                Some(Err(e)) => {
                    connection.notifier().notify_error(e.to_string()).await;
                    break;
                }
                None => break,
            },
            outgoing = outbox.recv() => match outgoing {
                Some(message) => {
                    let closing = message.is_close();
                    if sink.send(message.into()).await.is_err() {
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                // All senders dropped; nothing further can be written.
                None => break,
            },
        }
    }

    connection.dispose();
    connection.notifier().notify_close().await;
    manager.on_disconnect(id).await;
    debug!(socket = id, "websocket session closed");
}
