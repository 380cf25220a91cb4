//! Reserved event names
//!
//! These identifiers are part of the wire contract with browser trackers and
//! the agent UI and must stay stable.

// =============================================================================
// Inbound (handled by dedicated listeners, never relayed)
// =============================================================================

pub const UPDATE_SESSION: &str = "UPDATE_SESSION";
pub const CONNECT_ERROR: &str = "connect_error";
pub const CONNECT_FAILED: &str = "connect_failed";
pub const ERROR: &str = "error";

// =============================================================================
// Outbound notifications
// =============================================================================

pub const NEW_AGENT: &str = "NEW_AGENT";
pub const NO_AGENTS: &str = "NO_AGENT";
pub const AGENT_DISCONNECT: &str = "AGENT_DISCONNECTED";
pub const AGENTS_CONNECTED: &str = "AGENTS_CONNECTED";
pub const NO_SESSIONS: &str = "SESSION_DISCONNECTED";
pub const SESSION_ALREADY_CONNECTED: &str = "SESSION_ALREADY_CONNECTED";
pub const SESSION_RECONNECTED: &str = "SESSION_RECONNECTED";

/// Connection-level error events that are only logged
pub fn is_connection_error(name: &str) -> bool {
    matches!(name, CONNECT_ERROR | CONNECT_FAILED | ERROR)
}
