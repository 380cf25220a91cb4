//! Global WebSocket state management
//!
//! Wires the room directory to the components that act on it.

use std::sync::Arc;

use assist_shared::AddressResolver;

use super::audit::RoomAudit;
use super::directory::RoomDirectory;
use super::lifecycle::ConnectionLifecycle;
use super::projection::SessionProjection;
use super::relay::EventRelay;
use super::room::RoomManager;

/// Global WebSocket state shared across all connections
#[derive(Clone)]
pub struct WebSocketState {
    pub rooms: Arc<dyn RoomDirectory>,
    pub lifecycle: Arc<ConnectionLifecycle>,
    pub relay: Arc<EventRelay>,
    pub audit: Arc<RoomAudit>,
    pub projection: SessionProjection,
}

impl WebSocketState {
    /// Create state over a fresh in-memory room directory
    pub fn new(resolver: AddressResolver) -> Self {
        Self::with_directory(Arc::new(RoomManager::new()), resolver)
    }

    pub fn with_directory(rooms: Arc<dyn RoomDirectory>, resolver: AddressResolver) -> Self {
        Self {
            lifecycle: Arc::new(ConnectionLifecycle::new(Arc::clone(&rooms), resolver)),
            relay: Arc::new(EventRelay::new(Arc::clone(&rooms))),
            audit: Arc::new(RoomAudit::new(Arc::clone(&rooms))),
            projection: SessionProjection::new(Arc::clone(&rooms)),
            rooms,
        }
    }

    /// Get total number of active connections
    pub async fn connection_count(&self) -> usize {
        self.rooms.connection_count().await
    }

    /// Get total number of active rooms
    pub async fn room_count(&self) -> usize {
        self.rooms.rooms().await.len()
    }
}

impl Default for WebSocketState {
    fn default() -> Self {
        Self::new(AddressResolver::default())
    }
}
