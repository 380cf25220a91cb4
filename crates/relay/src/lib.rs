//! Assist relay library
//!
//! Real-time relay between end-user browser tabs and support agents
//! assisting them. Both sides connect over WebSocket and are grouped into
//! one room per recorded session.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod websocket;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
