//! Process-local socket registry and room fan-out
//!
//! One manager per WS route handler: it owns the live connections and a
//! `RelationalMap` from connection id to room name. All mutation happens
//! on the owning worker; fan-out iterates a snapshot, so a peer that
//! disconnects mid-loop costs one dropped write, never an error.

use super::connection::WsConnection;
use super::types::{EventEnvelope, SocketMessage, SocketResult};
use crate::relation::RelationalMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Registry of live sockets and their room memberships
pub struct SocketManager {
    sockets: RwLock<HashMap<u64, Arc<WsConnection>>>,
    rooms: RwLock<RelationalMap<u64, String>>,
}

impl SocketManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self {
            sockets: RwLock::new(HashMap::new()),
            rooms: RwLock::new(RelationalMap::new()),
        }
    }

    /// Register a connection on upgrade
    pub async fn add(&self, connection: Arc<WsConnection>) {
        let mut sockets = self.sockets.write().await;
        sockets.insert(connection.id(), connection);
    }

    /// Drop a connection and all of its room memberships. Idempotent.
    pub async fn on_disconnect(&self, id: u64) {
        let removed = {
            let mut sockets = self.sockets.write().await;
            sockets.remove(&id)
        };
        if removed.is_some() {
            let mut rooms = self.rooms.write().await;
            rooms.drop_key(&id);
            debug!(socket = id, "connection removed from manager");
        }
    }

    /// Join a room; returns `true` when the membership is new
    pub async fn join(&self, id: u64, room: String) -> bool {
        let mut rooms = self.rooms.write().await;
        let created = !rooms.has_value(&room);
        let newly_added = rooms.relate(id, room.clone());
        if created && newly_added {
            info!(room = %room, "room created");
        }
        newly_added
    }

    /// Leave a room; returns `true` when the membership existed
    pub async fn leave(&self, id: u64, room: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        rooms.unrelate(&id, &room.to_string())
    }

    /// Rooms a connection belongs to
    pub async fn rooms_of(&self, id: u64) -> HashSet<String> {
        self.rooms.read().await.values_of(&id)
    }

    /// Member ids of a room
    pub async fn members_of(&self, room: &str) -> HashSet<u64> {
        self.rooms.read().await.keys_of(&room.to_string())
    }

    /// Look up a live connection by id
    pub async fn by_id(&self, id: u64) -> Option<Arc<WsConnection>> {
        self.sockets.read().await.get(&id).cloned()
    }

    /// Number of live connections
    pub async fn len(&self) -> usize {
        self.sockets.read().await.len()
    }

    /// Whether no connection is registered
    pub async fn is_empty(&self) -> bool {
        self.sockets.read().await.is_empty()
    }

    // -- fan-out -----------------------------------------------------------

    fn deliver(connection: &WsConnection, message: SocketMessage) {
        if let Err(e) = connection.send(message) {
            debug!(socket = connection.id(), error = %e, "dropping fan-out write");
        }
    }

    /// Send to every live connection
    pub async fn send_to_all(&self, message: SocketMessage) {
        let targets: Vec<_> = self.sockets.read().await.values().cloned().collect();
        for target in targets {
            Self::deliver(&target, message.clone());
        }
    }

    /// Send to every live connection except `sender`
    pub async fn send_to_all_except(&self, sender: u64, message: SocketMessage) {
        let targets: Vec<_> = self.sockets.read().await.values().cloned().collect();
        for target in targets {
            if target.id() != sender {
                Self::deliver(&target, message.clone());
            }
        }
    }

    /// Send to every member of a room, whether or not the caller belongs
    /// to it
    pub async fn send_to_room(&self, room: &str, message: SocketMessage) {
        for target in self.room_targets(room, None).await {
            Self::deliver(&target, message.clone());
        }
    }

    /// Send to every member of a room except `sender`
    pub async fn send_to_room_except(&self, room: &str, sender: u64, message: SocketMessage) {
        for target in self.room_targets(room, Some(sender)).await {
            Self::deliver(&target, message.clone());
        }
    }

    /// Emit a typed event to every live connection
    pub async fn emit_to_all<E: Into<String>>(&self, event: E, data: Value) -> SocketResult<()> {
        let message = EventEnvelope::new(event, data).into_message()?;
        self.send_to_all(message).await;
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
        self.send_to_room(room, message).await;
        Ok(())
    }

    async fn room_targets(&self, room: &str, exclude: Option<u64>) -> Vec<Arc<WsConnection>> {
        let members = self.members_of(room).await;
        let sockets = self.sockets.read().await;
        members
            .into_iter()
            .filter(|id| Some(*id) != exclude)
            .filter_map(|id| sockets.get(&id).cloned())
            .collect()
    }
}

impl Default for SocketManager {
    fn default() -> Self {
        Self::new()
    }
}
