//! WebSocket event types and serialization
//!
//! Every text frame is `{"event": <name>, "args": [...]}` in both directions.
//! Inbound frames are classified into [`ClientEvent`]; outbound notifications
//! are built through the [`ServerEvent`] constructors so argument shapes stay
//! consistent with what trackers and the agent UI expect.

use assist_shared::{events, ConnectionId, Envelope};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Raw inbound frame
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl ClientFrame {
    /// First argument, `null` when the frame carried none
    pub fn into_payload(self) -> (String, Value) {
        let payload = self.args.into_iter().next().unwrap_or(Value::Null);
        (self.event, payload)
    }
}

/// Inbound event after classification against the reserved names
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Shared session state update (session senders only)
    Update(Value),
    /// `error` / `connect_error` / `connect_failed`, logged and dropped
    ConnectionError { kind: String, detail: Value },
    /// Any other application event
    Relay { name: String, payload: Value },
}

impl From<ClientFrame> for ClientEvent {
    fn from(frame: ClientFrame) -> Self {
        let (name, payload) = frame.into_payload();
        if name == events::UPDATE_SESSION {
            ClientEvent::Update(payload)
        } else if events::is_connection_error(&name) {
            ClientEvent::ConnectionError {
                kind: name,
                detail: payload,
            }
        } else {
            ClientEvent::Relay { name, payload }
        }
    }
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Event sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEvent {
    pub event: String,
    pub args: Vec<Value>,
}

impl ServerEvent {
    pub fn new(event: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            event: event.into(),
            args,
        }
    }

    pub fn session_already_connected() -> Self {
        Self::new(events::SESSION_ALREADY_CONNECTED, vec![])
    }

    pub fn agents_connected(agent_ids: &[ConnectionId]) -> Self {
        let ids = agent_ids.iter().map(|id| Value::String(id.to_string())).collect();
        Self::new(events::AGENTS_CONNECTED, vec![Value::Array(ids)])
    }

    pub fn session_reconnected(conn_id: ConnectionId) -> Self {
        Self::new(events::SESSION_RECONNECTED, vec![id_value(conn_id)])
    }

    pub fn no_sessions() -> Self {
        Self::new(events::NO_SESSIONS, vec![])
    }

    pub fn no_agents() -> Self {
        Self::new(events::NO_AGENTS, vec![])
    }

    pub fn new_agent(conn_id: ConnectionId, agent_info: Option<Value>) -> Self {
        Self::new(
            events::NEW_AGENT,
            vec![id_value(conn_id), agent_info.unwrap_or(Value::Null)],
        )
    }

    pub fn agent_disconnect(conn_id: ConnectionId) -> Self {
        Self::new(events::AGENT_DISCONNECT, vec![id_value(conn_id)])
    }

    pub fn update(envelope: &Envelope) -> Self {
        Self::new(events::UPDATE_SESSION, vec![envelope.to_value()])
    }

    /// Session-originated event, broadcast with its envelope
    pub fn from_session(name: &str, envelope: &Envelope) -> Self {
        Self::new(name, vec![envelope.to_value()])
    }

    /// Agent-originated event, tagged with the sending agent's id
    pub fn from_agent(name: &str, sender: ConnectionId, payload: Value) -> Self {
        Self::new(name, vec![id_value(sender), payload])
    }
}

fn id_value(id: ConnectionId) -> Value {
    Value::String(id.to_string())
}

/// Item queued on a connection's outbound channel
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Event(ServerEvent),
    /// Close the socket after flushing everything queued before it
    Close { code: u16, reason: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_client_frame_deserialization() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"event":"mouse_move","args":[{"x":1},2]}"#).unwrap();
        let (name, payload) = frame.into_payload();
        assert_eq!(name, "mouse_move");
        assert_eq!(payload, json!({"x": 1}));
    }

    #[test]
    fn test_frame_without_args() {
        let frame: ClientFrame = serde_json::from_str(r#"{"event":"ping_me"}"#).unwrap();
        assert_eq!(
            ClientEvent::from(frame),
            ClientEvent::Relay {
                name: "ping_me".to_string(),
                payload: Value::Null
            }
        );
    }

    #[test]
    fn test_reserved_names_are_classified() {
        let update: ClientFrame =
            serde_json::from_str(r#"{"event":"UPDATE_SESSION","args":[{"a":1}]}"#).unwrap();
        assert_eq!(ClientEvent::from(update), ClientEvent::Update(json!({"a": 1})));

        let err: ClientFrame =
            serde_json::from_str(r#"{"event":"connect_failed","args":["boom"]}"#).unwrap();
        assert!(matches!(
            ClientEvent::from(err),
            ClientEvent::ConnectionError { kind, .. } if kind == "connect_failed"
        ));
    }

    #[test]
    fn test_server_event_serialization() {
        let id = ConnectionId(Uuid::nil());
        let json = serde_json::to_string(&ServerEvent::agent_disconnect(id)).unwrap();
        assert_eq!(
            json,
            r#"{"event":"AGENT_DISCONNECTED","args":["00000000-0000-0000-0000-000000000000"]}"#
        );
    }

    #[test]
    fn test_notification_shapes() {
        assert_eq!(ServerEvent::no_sessions().event, "SESSION_DISCONNECTED");
        assert_eq!(ServerEvent::no_agents().event, "NO_AGENT");

        let id = ConnectionId::new();
        let agents = ServerEvent::agents_connected(&[id]);
        assert_eq!(agents.args, vec![json!([id.to_string()])]);

        let new_agent = ServerEvent::new_agent(id, None);
        assert_eq!(new_agent.args[1], Value::Null);
    }
}
