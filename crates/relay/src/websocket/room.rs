//! In-memory room management
//!
//! Process-local [`RoomDirectory`] backing both the server and the tests.

use std::collections::HashMap;
use std::sync::Arc;

use assist_shared::{AssistError, AssistResult, ConnectionId};
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::connection::Connection;
use super::directory::{RoomDirectory, RoomSnapshot};
use super::events::ServerEvent;

/// Close code sent on force-close (policy violation)
pub const FORCE_CLOSE_CODE: u16 = 1008;

/// Manages assist rooms and the connection registry
pub struct RoomManager {
    /// Map of connection_id -> connection
    connections: Arc<RwLock<HashMap<ConnectionId, Arc<Connection>>>>,
    /// Map of room_id -> list of connections
    rooms: Arc<RwLock<HashMap<String, Vec<Arc<Connection>>>>>,
}

impl RoomManager {
    /// Create a new room manager
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn drop_from_rooms(&self, conn_id: ConnectionId) {
        let mut rooms = self.rooms.write().await;
        let mut removed_from = Vec::new();

        for (room_id, conns) in rooms.iter_mut() {
            let before_len = conns.len();
            conns.retain(|c| c.id != conn_id);
            if conns.len() < before_len {
                removed_from.push(room_id.clone());
            }
        }

        // Clean up empty rooms
        rooms.retain(|_, conns| !conns.is_empty());

        if !removed_from.is_empty() {
            tracing::debug!(
                connection_id = %conn_id,
                rooms = ?removed_from,
                "Removed connection from rooms"
            );
        }
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomDirectory for RoomManager {
    async fn register(&self, conn: Arc<Connection>) {
        let mut connections = self.connections.write().await;
        connections.insert(conn.id, Arc::clone(&conn));

        tracing::debug!(
            connection_id = %conn.id,
            role = %conn.role,
            total_connections = connections.len(),
            "Connection registered"
        );
    }

    async fn unregister(&self, conn_id: ConnectionId) {
        let removed = self.connections.write().await.remove(&conn_id);
        self.drop_from_rooms(conn_id).await;

        if removed.is_some() {
            tracing::debug!(connection_id = %conn_id, "Connection unregistered");
        }
    }

    async fn join(&self, conn: Arc<Connection>) {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(conn.room_id.clone()).or_insert_with(Vec::new);
        members.retain(|c| c.id != conn.id);
        members.push(Arc::clone(&conn));

        tracing::debug!(
            room_id = %conn.room_id,
            connection_id = %conn.id,
            room_size = members.len(),
            "Connection joined room"
        );
    }

    async fn list_members(&self, room_id: &str) -> Vec<Arc<Connection>> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).cloned().unwrap_or_default()
    }

    async fn rooms(&self) -> Vec<RoomSnapshot> {
        let rooms = self.rooms.read().await;
        rooms
            .iter()
            .map(|(room_id, conns)| RoomSnapshot {
                room_id: room_id.clone(),
                member_ids: conns.iter().map(|c| c.id).collect(),
            })
            .collect()
    }

    async fn send_to(&self, conn_id: ConnectionId, event: ServerEvent) -> AssistResult<()> {
        let conn = {
            let connections = self.connections.read().await;
            connections.get(&conn_id).cloned()
        };

        match conn {
            Some(conn) => conn.send(event),
            None => Err(AssistError::Transport(format!(
                "connection {} not registered",
                conn_id
            ))),
        }
    }

    /// Silently skips closed connections (they are cleaned up on their own
    /// disconnect path)
    async fn broadcast(
        &self,
        room_id: &str,
        event: ServerEvent,
        except: Option<ConnectionId>,
    ) -> usize {
        let rooms = self.rooms.read().await;
        let Some(conns) = rooms.get(room_id) else {
            tracing::debug!(
                room_id = %room_id,
                event = %event.event,
                "No room found - no recipients"
            );
            return 0;
        };

        let mut success_count = 0;
        let mut failed_count = 0;

        for conn in conns.iter().filter(|c| Some(c.id) != except) {
            match conn.send(event.clone()) {
                Ok(()) => success_count += 1,
                Err(_) => {
                    failed_count += 1;
                    tracing::warn!(
                        connection_id = %conn.id,
                        "Failed to send event to connection (likely closed)"
                    );
                }
            }
        }

        tracing::debug!(
            room_id = %room_id,
            event = %event.event,
            recipients = success_count,
            failed = failed_count,
            "Broadcast event to room"
        );

        success_count
    }

    async fn disconnect(&self, conn_id: ConnectionId, reason: &str) {
        let conn = self.connections.read().await.get(&conn_id).cloned();
        if let Some(conn) = conn {
            if conn.close(FORCE_CLOSE_CODE, reason).is_err() {
                tracing::debug!(connection_id = %conn_id, "Socket writer already gone");
            }
        }
        self.unregister(conn_id).await;
    }

    async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
