//! Shared fixtures for websocket tests

use std::sync::Arc;

use assist_shared::AddressResolver;
use tokio::sync::mpsc;

use super::connection::{Connection, Handshake};
use super::events::Outbound;
use super::lifecycle::{Admission, ConnectionLifecycle};
use super::presence::PresenceAccountant;
use super::relay::EventRelay;
use super::room::RoomManager;

pub(crate) struct Harness {
    pub rooms: Arc<RoomManager>,
    pub lifecycle: ConnectionLifecycle,
    pub relay: EventRelay,
}

impl Harness {
    pub fn new() -> Self {
        let rooms = Arc::new(RoomManager::new());
        Self {
            lifecycle: ConnectionLifecycle::new(rooms.clone(), AddressResolver::seeded(None, 42)),
            relay: EventRelay::new(rooms.clone()),
            rooms,
        }
    }

    pub fn presence(&self) -> PresenceAccountant {
        PresenceAccountant::new(self.rooms.clone())
    }

    pub async fn connect(
        &self,
        identity: &str,
        peer_id: &str,
        session_info: Option<&str>,
    ) -> (Admission, mpsc::UnboundedReceiver<Outbound>) {
        self.connect_with(identity, peer_id, session_info, None).await
    }

    pub async fn connect_with(
        &self,
        identity: &str,
        peer_id: &str,
        session_info: Option<&str>,
        agent_info: Option<&str>,
    ) -> (Admission, mpsc::UnboundedReceiver<Outbound>) {
        let handshake = Handshake {
            identity: identity.to_string(),
            peer_id: peer_id.to_string(),
            session_info: session_info.map(str::to_string),
            agent_info: agent_info.map(str::to_string),
            token: None,
            user_agent: Some("test-agent/1.0".to_string()),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let admission = self.lifecycle.admit(&handshake, tx).await;
        (admission, rx)
    }
}

impl Admission {
    pub(crate) fn joined(self) -> Arc<Connection> {
        match self {
            Admission::Joined(conn) => conn,
            Admission::Refused(err) => panic!("connection refused: {err}"),
        }
    }
}

/// Everything queued so far
pub(crate) fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut received = Vec::new();
    while let Ok(item) = rx.try_recv() {
        received.push(item);
    }
    received
}

/// Event names of the queued events, close frames skipped
pub(crate) fn events_of(received: &[Outbound]) -> Vec<&str> {
    received
        .iter()
        .filter_map(|item| match item {
            Outbound::Event(event) => Some(event.event.as_str()),
            Outbound::Close { .. } => None,
        })
        .collect()
}
