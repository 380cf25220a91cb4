//! Room directory capability
//!
//! The lifecycle, presence accounting and relay only talk to rooms through
//! this trait. Every call is a suspension point: membership may change between
//! two calls, and callers treat results as snapshots.

use std::sync::Arc;

use assist_shared::{AssistResult, ConnectionId};
use async_trait::async_trait;

use super::connection::Connection;
use super::events::ServerEvent;

/// Point-in-time view of one room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub member_ids: Vec<ConnectionId>,
}

#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Make a connection addressable by id, before it joins any room
    async fn register(&self, conn: Arc<Connection>);

    /// Forget a connection and drop it from every room
    async fn unregister(&self, conn_id: ConnectionId);

    /// Add a registered connection to its room
    async fn join(&self, conn: Arc<Connection>);

    /// Current members of a room; empty when the room does not exist
    async fn list_members(&self, room_id: &str) -> Vec<Arc<Connection>>;

    /// Every room that currently has at least one member
    async fn rooms(&self) -> Vec<RoomSnapshot>;

    async fn room_ids(&self) -> Vec<String> {
        self.rooms().await.into_iter().map(|r| r.room_id).collect()
    }

    async fn send_to(&self, conn_id: ConnectionId, event: ServerEvent) -> AssistResult<()>;

    /// Send to every member of a room except `except`. Returns the number of
    /// connections the event was queued for.
    async fn broadcast(
        &self,
        room_id: &str,
        event: ServerEvent,
        except: Option<ConnectionId>,
    ) -> usize;

    /// Force-close: flush, send a close frame and release the connection
    async fn disconnect(&self, conn_id: ConnectionId, reason: &str);

    async fn connection_count(&self) -> usize;
}
