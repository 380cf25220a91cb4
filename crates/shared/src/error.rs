//! Error types for the assist relay

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssistError {
    /// Peer token could not be split into project and session
    #[error("Malformed peer id: {0}")]
    MalformedPeerId(String),

    /// Handshake identity is neither `session` nor `agent`
    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    /// Another member of the project already holds this tab id
    #[error("Session already connected for tab {tab_id}")]
    DuplicateTab { tab_id: String },

    /// Agent-originated event could not be addressed to any session
    #[error("No session connected in room {room_id}")]
    NoTargetSession { room_id: String },

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    /// Housekeeping failure, never surfaced to a connection
    #[error("Advisory failure: {0}")]
    Advisory(String),
}

pub type AssistResult<T> = Result<T, AssistError>;
