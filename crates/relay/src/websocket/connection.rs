//! WebSocket connection management
//!
//! Represents an accepted assist connection: its resolved identity, role,
//! shared session attributes and the channel feeding its socket writer.

use std::sync::Arc;

use assist_shared::{AssistError, AssistResult, ConnectionId, ResolvedPeer, Role, SessionInfo};
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::{mpsc, RwLock};

use super::events::{Outbound, ServerEvent};

/// Session attributes shared between the owning connection, room mirrors and
/// the live-session projection
pub type SharedSessionInfo = Arc<RwLock<SessionInfo>>;

/// Read-only handshake parameters supplied with the upgrade request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub peer_id: String,
    pub session_info: Option<String>,
    pub agent_info: Option<String>,
    pub token: Option<String>,
    /// Filled from the `User-Agent` header, never from the query
    #[serde(skip)]
    pub user_agent: Option<String>,
}

/// Represents an active assist connection
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub role: Role,
    /// Full peer token as supplied by the client
    pub peer_id: String,
    pub project_key: String,
    pub session_id: String,
    pub room_id: String,
    pub tab_id: String,
    pub connected_at: OffsetDateTime,
    /// Present for session connections only
    pub session_info: Option<SharedSessionInfo>,
    /// Present for agent connections that supplied one
    pub agent_info: Option<Value>,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl Connection {
    /// Create a new connection
    pub fn new(peer: ResolvedPeer, role: Role, sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: ConnectionId::new(),
            role,
            peer_id: peer.peer_id,
            project_key: peer.project_key,
            session_id: peer.session_id,
            room_id: peer.room_id,
            tab_id: peer.tab_id,
            connected_at: OffsetDateTime::now_utc(),
            session_info: None,
            agent_info: None,
            sender,
        }
    }

    pub fn with_session_info(mut self, info: SessionInfo) -> Self {
        self.session_info = Some(Arc::new(RwLock::new(info)));
        self
    }

    pub fn with_agent_info(mut self, info: Option<Value>) -> Self {
        self.agent_info = info;
        self
    }

    pub fn is_session(&self) -> bool {
        self.role == Role::Session
    }

    pub fn is_agent(&self) -> bool {
        self.role == Role::Agent
    }

    /// Send an event to this connection
    ///
    /// Fails only when the socket writer is gone
    pub fn send(&self, event: ServerEvent) -> AssistResult<()> {
        self.sender
            .send(Outbound::Event(event))
            .map_err(|_| AssistError::Transport(format!("connection {} closed", self.id)))
    }

    /// Ask the socket writer to close after flushing queued events
    pub fn close(&self, code: u16, reason: &str) -> AssistResult<()> {
        self.sender
            .send(Outbound::Close {
                code,
                reason: reason.to_string(),
            })
            .map_err(|_| AssistError::Transport(format!("connection {} closed", self.id)))
    }

    /// Copy of the current session attributes
    pub async fn session_info_snapshot(&self) -> Option<SessionInfo> {
        match &self.session_info {
            Some(info) => Some(info.read().await.clone()),
            None => None,
        }
    }

    /// Merge update fields into this connection's session attributes.
    /// Returns false for connections without session info.
    pub async fn merge_session_info(
        &self,
        data: Option<&Value>,
        tab_id: Option<&Value>,
    ) -> bool {
        match &self.session_info {
            Some(info) => {
                info.write().await.merge(data, tab_id);
                true
            }
            None => false,
        }
    }
}
