//! Connection lifecycle
//!
//! Runs once per accepted socket:
//!
//! ```text
//! Connecting -> AdmissionCheck -> Joined -> Disconnected
//!                    |
//!                    +-> Refused
//! ```
//!
//! Presence is read as a snapshot before acting on it. A concurrent join or
//! leave between the snapshot and the notification only makes the
//! notification stale, never wrong for the connection that triggered it.

use std::sync::Arc;

use assist_shared::{AddressResolver, AssistError, ConnectionId, ResolvedPeer, Role, SessionInfo};
use serde_json::Value;
use tokio::sync::mpsc;

use super::connection::{Connection, Handshake};
use super::directory::RoomDirectory;
use super::events::{Outbound, ServerEvent};
use super::presence::PresenceAccountant;
use super::room::FORCE_CLOSE_CODE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Connecting,
    AdmissionCheck,
    Refused,
    Joined,
    Disconnected,
}

/// Outcome of admission
#[derive(Debug)]
pub enum Admission {
    Joined(Arc<Connection>),
    Refused(AssistError),
}

pub struct ConnectionLifecycle {
    directory: Arc<dyn RoomDirectory>,
    presence: PresenceAccountant,
    resolver: AddressResolver,
}

impl ConnectionLifecycle {
    pub fn new(directory: Arc<dyn RoomDirectory>, resolver: AddressResolver) -> Self {
        Self {
            presence: PresenceAccountant::new(Arc::clone(&directory)),
            directory,
            resolver,
        }
    }

    /// Resolve identity, run the admission checks and join the room.
    ///
    /// A refused connection has already been notified and closed when this
    /// returns.
    pub async fn admit(
        &self,
        handshake: &Handshake,
        sender: mpsc::UnboundedSender<Outbound>,
    ) -> Admission {
        let conn = match self.resolve(handshake, sender.clone()) {
            Ok(conn) => Arc::new(conn),
            Err(err) => {
                tracing::warn!(
                    peer_id = %handshake.peer_id,
                    identity = %handshake.identity,
                    error = %err,
                    "Refusing connection with invalid identity"
                );
                let close = Outbound::Close {
                    code: FORCE_CLOSE_CODE,
                    reason: err.to_string(),
                };
                if sender.send(close).is_err() {
                    tracing::debug!(
                        peer_id = %handshake.peer_id,
                        "Close frame not delivered, socket already gone"
                    );
                }
                return Admission::Refused(err);
            }
        };

        self.directory.register(Arc::clone(&conn)).await;
        transition(&conn, LifecycleState::Connecting, LifecycleState::AdmissionCheck);

        let count = self.presence.count(&conn.room_id).await;

        match conn.role {
            Role::Session => {
                if let Some(owner) = self
                    .presence
                    .find_tab_owner(&conn.project_key, &conn.tab_id)
                    .await
                {
                    return self.refuse_duplicate(&conn, owner).await;
                }

                if count.agents > 0 {
                    tracing::debug!(
                        connection_id = %conn.id,
                        room_id = %conn.room_id,
                        "Notifying new session about connected agents"
                    );
                    let agent_ids = self.presence.list_agent_ids(&conn.room_id).await;
                    self.notify(conn.id, ServerEvent::agents_connected(&agent_ids)).await;
                    self.directory
                        .broadcast(
                            &conn.room_id,
                            ServerEvent::session_reconnected(conn.id),
                            Some(conn.id),
                        )
                        .await;
                }
            }
            Role::Agent => {
                if count.sessions <= 0 {
                    tracing::debug!(
                        connection_id = %conn.id,
                        peer_id = %conn.peer_id,
                        "Notifying new agent about no sessions"
                    );
                    self.notify(conn.id, ServerEvent::no_sessions()).await;
                }
            }
        }

        self.directory.join(Arc::clone(&conn)).await;
        transition(&conn, LifecycleState::AdmissionCheck, LifecycleState::Joined);

        if conn.is_agent() {
            self.directory
                .broadcast(
                    &conn.room_id,
                    ServerEvent::new_agent(conn.id, conn.agent_info.clone()),
                    Some(conn.id),
                )
                .await;
        }

        tracing::info!(
            connection_id = %conn.id,
            room_id = %conn.room_id,
            role = %conn.role,
            tab_id = %conn.tab_id,
            "Connection joined"
        );

        Admission::Joined(conn)
    }

    /// Leave the room and tell whoever remains what changed
    pub async fn disconnect(&self, conn: &Connection) {
        self.directory.unregister(conn.id).await;
        transition(conn, LifecycleState::Joined, LifecycleState::Disconnected);

        if conn.is_agent() {
            self.directory
                .broadcast(&conn.room_id, ServerEvent::agent_disconnect(conn.id), None)
                .await;
        }

        let count = self.presence.count(&conn.room_id).await;
        if count.is_absent() {
            tracing::debug!(room_id = %conn.room_id, "Room not found after disconnect");
        }
        if count.sessions == 0 {
            tracing::debug!(room_id = %conn.room_id, "Notifying room about no sessions");
            self.directory
                .broadcast(&conn.room_id, ServerEvent::no_sessions(), None)
                .await;
        }
        if count.agents == 0 {
            tracing::debug!(room_id = %conn.room_id, "Notifying room about no agents");
            self.directory
                .broadcast(&conn.room_id, ServerEvent::no_agents(), None)
                .await;
        }

        tracing::info!(
            connection_id = %conn.id,
            room_id = %conn.room_id,
            role = %conn.role,
            "Connection disconnected"
        );
    }

    fn resolve(
        &self,
        handshake: &Handshake,
        sender: mpsc::UnboundedSender<Outbound>,
    ) -> Result<Connection, AssistError> {
        let role: Role = handshake.identity.parse()?;
        let peer = self.resolver.resolve(&handshake.peer_id)?;

        if peer.generated_tab {
            tracing::debug!(
                peer_id = %peer.peer_id,
                tab_id = %peer.tab_id,
                "Assigned default tab id"
            );
        }

        let conn = match role {
            Role::Session => {
                let info = session_info_from_handshake(handshake, &peer);
                Connection::new(peer, role, sender).with_session_info(info)
            }
            Role::Agent => {
                let info = handshake.agent_info.as_deref().map(parse_agent_info);
                Connection::new(peer, role, sender).with_agent_info(info)
            }
        };
        Ok(conn)
    }

    async fn refuse_duplicate(&self, conn: &Connection, owner: ConnectionId) -> Admission {
        tracing::warn!(
            connection_id = %conn.id,
            peer_id = %conn.peer_id,
            tab_id = %conn.tab_id,
            existing_connection = %owner,
            "Session already connected, refusing new connection"
        );

        self.notify(conn.id, ServerEvent::session_already_connected()).await;
        self.directory.disconnect(conn.id, "session already connected").await;
        transition(conn, LifecycleState::AdmissionCheck, LifecycleState::Refused);

        Admission::Refused(AssistError::DuplicateTab {
            tab_id: conn.tab_id.clone(),
        })
    }

    async fn notify(&self, conn_id: ConnectionId, event: ServerEvent) {
        if let Err(e) = self.directory.send_to(conn_id, event).await {
            tracing::debug!(connection_id = %conn_id, error = %e, "Notification not delivered");
        }
    }
}

/// Session attributes supplied at connect time, stamped with identity
/// defaults the live-session views rely on
fn session_info_from_handshake(handshake: &Handshake, peer: &ResolvedPeer) -> SessionInfo {
    let mut info = match handshake.session_info.as_deref() {
        Some(raw) => SessionInfo::from_json_str(raw).unwrap_or_else(|| {
            tracing::warn!(peer_id = %peer.peer_id, "Ignoring invalid sessionInfo");
            SessionInfo::default()
        }),
        None => SessionInfo::default(),
    };

    info.insert_default(
        SessionInfo::SESSION_ID_KEY,
        Value::String(peer.session_id.clone()),
    );
    info.0.insert(
        SessionInfo::TAB_ID_KEY.to_string(),
        Value::String(peer.tab_id.clone()),
    );
    if let Some(ua) = &handshake.user_agent {
        info.insert_default(SessionInfo::USER_AGENT_KEY, Value::String(ua.clone()));
    }
    info
}

/// Agent info is JSON when well-formed, otherwise kept as the raw text
fn parse_agent_info(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn transition(conn: &Connection, from: LifecycleState, to: LifecycleState) {
    tracing::debug!(
        connection_id = %conn.id,
        room_id = %conn.room_id,
        from = ?from,
        to = ?to,
        "Lifecycle transition"
    );
}
