//! WebSocket support for co-browsing assist calls
//!
//! Browser tabs (sessions) and support agents connect here and are grouped
//! into one room per recorded session.
//!
//! # Architecture
//!
//! - **Connection**: An admitted socket with its resolved peer identity
//! - **Directory**: Room membership capability ([`RoomManager`] in memory)
//! - **Presence**: Session/agent counts taken from membership snapshots
//! - **Lifecycle**: Admission, role notifications and teardown
//! - **Relay**: Forwarding of application events inside a room
//! - **Audit**: Periodic diagnostic pass over all rooms
//! - **Handler**: Axum WebSocket route handler

pub mod audit;
pub mod connection;
pub mod directory;
pub mod events;
pub mod handler;
pub mod lifecycle;
pub mod presence;
pub mod projection;
pub mod relay;
pub mod room;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use directory::RoomDirectory;
pub use handler::ws_handler;
pub use room::RoomManager;
pub use state::WebSocketState;
