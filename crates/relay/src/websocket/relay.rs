//! Event relay
//!
//! Forwards application events between the members of a room:
//!
//! - session events are broadcast to the rest of the room, wrapped in the
//!   `{meta, data}` envelope
//! - agent events go to the single session tab named by `meta.tabId`
//! - `UPDATE_SESSION` merges into the shared session attributes of every
//!   session tab in the room

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use assist_shared::{meta_tab_id, AssistError, Envelope, Role};
use serde_json::Value;
use tokio::sync::OwnedMutexGuard;

use super::connection::Connection;
use super::directory::RoomDirectory;
use super::events::{ClientEvent, ServerEvent};
use super::presence::PresenceAccountant;

/// Per-room async locks serializing session-info updates
#[derive(Default)]
pub struct RoomLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, room_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(room_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop the room's lock once nobody holds or waits on it
    pub fn release(&self, room_id: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(room_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(room_id);
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct EventRelay {
    directory: Arc<dyn RoomDirectory>,
    presence: PresenceAccountant,
    locks: RoomLocks,
}

impl EventRelay {
    pub fn new(directory: Arc<dyn RoomDirectory>) -> Self {
        Self {
            presence: PresenceAccountant::new(Arc::clone(&directory)),
            directory,
            locks: RoomLocks::new(),
        }
    }

    /// Dispatch one inbound event from a joined connection
    pub async fn handle(&self, conn: &Connection, event: ClientEvent) {
        match event {
            ClientEvent::Update(payload) => self.update_session(conn, payload).await,
            ClientEvent::ConnectionError { kind, detail } => {
                tracing::error!(
                    connection_id = %conn.id,
                    peer_id = %conn.peer_id,
                    kind = %kind,
                    detail = %detail,
                    "Client reported connection error"
                );
            }
            ClientEvent::Relay { name, payload } => match conn.role {
                Role::Session => self.relay_from_session(conn, &name, payload).await,
                Role::Agent => self.relay_from_agent(conn, &name, payload).await,
            },
        }
    }

    async fn relay_from_session(&self, conn: &Connection, name: &str, payload: Value) {
        let envelope = Envelope::from_payload(payload).normalize(&conn.tab_id);
        self.directory
            .broadcast(
                &conn.room_id,
                ServerEvent::from_session(name, &envelope),
                Some(conn.id),
            )
            .await;
    }

    async fn relay_from_agent(&self, conn: &Connection, name: &str, payload: Value) {
        let tab_id = meta_tab_id(&payload);

        let Some(target) = self
            .presence
            .find_session_connection(&conn.room_id, tab_id)
            .await
        else {
            let err = AssistError::NoTargetSession {
                room_id: conn.room_id.clone(),
            };
            tracing::debug!(
                connection_id = %conn.id,
                event = %name,
                tab_id = ?tab_id,
                error = %err,
                "Agent event not delivered"
            );
            if let Err(e) = self.directory.send_to(conn.id, ServerEvent::no_sessions()).await {
                tracing::debug!(connection_id = %conn.id, error = %e, "Notification not delivered");
            }
            return;
        };

        let event = ServerEvent::from_agent(name, conn.id, payload);
        if let Err(e) = self.directory.send_to(target, event).await {
            tracing::warn!(
                connection_id = %conn.id,
                target = %target,
                event = %name,
                error = %e,
                "Failed to deliver agent event"
            );
        }
    }

    async fn update_session(&self, conn: &Connection, payload: Value) {
        if !conn.is_session() {
            tracing::debug!(
                connection_id = %conn.id,
                role = %conn.role,
                "Ignoring session update from non-session connection"
            );
            return;
        }

        let envelope = Envelope::from_payload(payload).normalize(&conn.tab_id);
        let tab_id = envelope.tab_id();

        {
            let _guard = self.locks.acquire(&conn.room_id).await;

            conn.merge_session_info(envelope.data(), tab_id).await;
            self.directory
                .broadcast(&conn.room_id, ServerEvent::update(&envelope), Some(conn.id))
                .await;

            let mirrors = self.directory.list_members(&conn.room_id).await;
            let mut mirrored = 0;
            for member in mirrors.iter().filter(|m| m.id != conn.id) {
                if member
                    .merge_session_info(envelope.data(), tab_id)
                    .await
                {
                    mirrored += 1;
                }
            }

            tracing::debug!(
                connection_id = %conn.id,
                room_id = %conn.room_id,
                mirrored,
                "Session info updated"
            );
        }

        self.locks.release(&conn.room_id);
    }

    #[cfg(test)]
    pub(crate) fn locks(&self) -> &RoomLocks {
        &self.locks
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::websocket::events::Outbound;
    use crate::websocket::test_support::{drain, Harness};
    use serde_json::json;

    fn relay(name: &str, payload: Value) -> ClientEvent {
        ClientEvent::Relay {
            name: name.to_string(),
            payload,
        }
    }

    #[tokio::test]
    async fn test_session_event_is_wrapped_and_broadcast() {
        let hx = Harness::new();
        let session = hx.connect("session", "projA-sess1-t1", None).await.0.joined();
        let (_, mut other_rx) = hx.connect("session", "projA-sess1-t2", None).await;
        let (_, mut agent_rx) = hx.connect("agent", "projA-sess1", None).await;
        drain(&mut other_rx);

        hx.relay.handle(&session, relay("mouse", json!({"x": 1}))).await;

        let expected = Outbound::Event(ServerEvent::new(
            "mouse",
            vec![json!({"meta": {"tabId": "t1", "version": 1}, "data": {"x": 1}})],
        ));
        assert_eq!(drain(&mut agent_rx), vec![expected.clone()]);
        assert_eq!(drain(&mut other_rx), vec![expected]);
    }

    #[tokio::test]
    async fn test_wrapped_session_event_passes_through() {
        let hx = Harness::new();
        let session = hx.connect("session", "projA-sess1-t1", None).await.0.joined();
        let (_, mut agent_rx) = hx.connect("agent", "projA-sess1", None).await;

        let payload = json!({"meta": {"tabId": "t1", "version": 2}, "data": [1, 2]});
        hx.relay.handle(&session, relay("scroll", payload.clone())).await;

        assert_eq!(
            drain(&mut agent_rx),
            vec![Outbound::Event(ServerEvent::new("scroll", vec![payload]))]
        );
    }

    #[tokio::test]
    async fn test_agent_event_goes_to_addressed_tab() {
        let hx = Harness::new();
        let (_, mut t1_rx) = hx.connect("session", "projA-sess1-t1", None).await;
        let (_, mut t2_rx) = hx.connect("session", "projA-sess1-t2", None).await;
        let agent = hx.connect("agent", "projA-sess1", None).await.0.joined();
        drain(&mut t1_rx);
        drain(&mut t2_rx);

        let payload = json!({"meta": {"tabId": "t2"}, "data": "click"});
        hx.relay.handle(&agent, relay("control", payload.clone())).await;

        assert!(drain(&mut t1_rx).is_empty());
        assert_eq!(
            drain(&mut t2_rx),
            vec![Outbound::Event(ServerEvent::from_agent(
                "control", agent.id, payload
            ))]
        );
    }

    #[tokio::test]
    async fn test_wrapped_session_event_is_relayed_verbatim() {
        let hx = Harness::new();
        let session = hx.connect("session", "projA-sess1-t1", None).await.0.joined();
        let (_, mut agent_rx) = hx.connect("agent", "projA-sess1", None).await;

        for payload in [json!({"meta": {"tabId": "t1"}}), json!({"data": 5, "meta": null})] {
            hx.relay.handle(&session, relay("input", payload.clone())).await;
            assert_eq!(
                drain(&mut agent_rx),
                vec![Outbound::Event(ServerEvent::new("input", vec![payload]))]
            );
        }
    }

    #[tokio::test]
    async fn test_agent_event_with_non_string_tab_is_not_delivered() {
        let hx = Harness::new();
        let (_, mut t1_rx) = hx.connect("session", "projA-sess1-t1", None).await;
        let (agent, mut agent_rx) = hx.connect("agent", "projA-sess1", None).await;
        let agent = agent.joined();
        drain(&mut t1_rx);
        drain(&mut agent_rx);

        for tab in [Value::Null, json!(42)] {
            let payload = json!({"meta": {"tabId": tab}, "data": 1});
            hx.relay.handle(&agent, relay("control", payload)).await;

            assert_eq!(
                drain(&mut agent_rx),
                vec![Outbound::Event(ServerEvent::no_sessions())]
            );
            assert!(drain(&mut t1_rx).is_empty());
        }
    }

    #[tokio::test]
    async fn test_agent_event_with_null_meta_goes_to_first_session() {
        let hx = Harness::new();
        let (_, mut t1_rx) = hx.connect("session", "projA-sess1-t1", None).await;
        let agent = hx.connect("agent", "projA-sess1", None).await.0.joined();
        drain(&mut t1_rx);

        let payload = json!({"meta": null, "data": 1});
        hx.relay.handle(&agent, relay("control", payload.clone())).await;

        assert_eq!(
            drain(&mut t1_rx),
            vec![Outbound::Event(ServerEvent::from_agent(
                "control", agent.id, payload
            ))]
        );
    }

    #[tokio::test]
    async fn test_agent_event_without_tab_goes_to_first_session() {
        let hx = Harness::new();
        let (_, mut t1_rx) = hx.connect("session", "projA-sess1-t1", None).await;
        let agent = hx.connect("agent", "projA-sess1", None).await.0.joined();
        drain(&mut t1_rx);

        hx.relay.handle(&agent, relay("call_end", json!("bye"))).await;

        assert_eq!(
            drain(&mut t1_rx),
            vec![Outbound::Event(ServerEvent::new(
                "call_end",
                vec![json!(agent.id.to_string()), json!("bye")]
            ))]
        );
    }

    #[tokio::test]
    async fn test_agent_event_without_match_notifies_sender_only() {
        let hx = Harness::new();
        let (_, mut t1_rx) = hx.connect("session", "projA-sess1-t1", None).await;
        let (agent, mut agent_rx) = hx.connect("agent", "projA-sess1", None).await;
        let (_, mut other_agent_rx) = hx.connect("agent", "projA-sess1", None).await;
        let agent = agent.joined();
        drain(&mut t1_rx);
        drain(&mut agent_rx);

        let payload = json!({"meta": {"tabId": "gone"}, "data": {}});
        hx.relay.handle(&agent, relay("control", payload)).await;

        assert_eq!(
            drain(&mut agent_rx),
            vec![Outbound::Event(ServerEvent::no_sessions())]
        );
        assert!(drain(&mut t1_rx).is_empty());
        assert!(drain(&mut other_agent_rx).is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_into_every_tab() {
        let hx = Harness::new();
        let a = hx
            .connect("session", "projA-sess1-A", Some(r#"{"userId":"old"}"#))
            .await
            .0
            .joined();
        let b = hx.connect("session", "projA-sess1-B", None).await.0.joined();
        let (_, mut agent_rx) = hx.connect("agent", "projA-sess1", None).await;

        hx.relay
            .handle(&a, ClientEvent::Update(json!({"userId": "new"})))
            .await;

        for conn in [&a, &b] {
            let info = conn.session_info_snapshot().await.unwrap();
            assert_eq!(info.get("userId"), Some(&json!("new")));
            assert_eq!(info.get("tabId"), Some(&json!("A")));
        }

        assert_eq!(
            drain(&mut agent_rx),
            vec![Outbound::Event(ServerEvent::new(
                "UPDATE_SESSION",
                vec![json!({"meta": {"tabId": "A", "version": 1}, "data": {"userId": "new"}})]
            ))]
        );
        assert!(hx.relay.locks().is_empty());
    }

    #[tokio::test]
    async fn test_update_stamps_tab_as_received() {
        let hx = Harness::new();
        let a = hx.connect("session", "projA-sess1-A", None).await.0.joined();
        let b = hx.connect("session", "projA-sess1-B", None).await.0.joined();

        hx.relay
            .handle(&a, ClientEvent::Update(json!({"meta": {"tabId": 9}})))
            .await;

        for conn in [&a, &b] {
            let info = conn.session_info_snapshot().await.unwrap();
            assert_eq!(info.get("tabId"), Some(&json!(9)));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_converge() {
        let hx = Arc::new(Harness::new());
        let a = hx.connect("session", "projA-sess1-A", None).await.0.joined();
        let b = hx.connect("session", "projA-sess1-B", None).await.0.joined();

        let mut tasks = Vec::new();
        for round in 0..50 {
            for conn in [&a, &b] {
                let hx = Arc::clone(&hx);
                let conn = Arc::clone(conn);
                tasks.push(tokio::spawn(async move {
                    let update = json!({"owner": conn.tab_id, "round": round});
                    hx.relay.handle(&conn, ClientEvent::Update(update)).await;
                }));
            }
        }
        for task in tasks {
            task.await.unwrap();
        }

        let info_a = a.session_info_snapshot().await.unwrap();
        let info_b = b.session_info_snapshot().await.unwrap();
        for key in ["owner", "round", "tabId"] {
            assert_eq!(info_a.get(key), info_b.get(key), "{key} diverged");
        }
        assert_eq!(info_a.get("owner"), info_a.get("tabId"));
        assert!(hx.relay.locks().is_empty());
    }

    #[tokio::test]
    async fn test_update_from_agent_is_ignored() {
        let hx = Harness::new();
        let (_, mut session_rx) = hx.connect("session", "projA-sess1-t1", None).await;
        let agent = hx.connect("agent", "projA-sess1", None).await.0.joined();
        drain(&mut session_rx);

        hx.relay
            .handle(&agent, ClientEvent::Update(json!({"userId": "x"})))
            .await;

        assert!(drain(&mut session_rx).is_empty());
    }

    #[tokio::test]
    async fn test_connection_error_is_not_relayed() {
        let hx = Harness::new();
        let session = hx.connect("session", "projA-sess1-t1", None).await.0.joined();
        let (_, mut agent_rx) = hx.connect("agent", "projA-sess1", None).await;

        let event = ClientEvent::ConnectionError {
            kind: "connect_error".to_string(),
            detail: json!("timeout"),
        };
        hx.relay.handle(&session, event).await;

        assert!(drain(&mut agent_rx).is_empty());
    }

    #[tokio::test]
    async fn test_room_locks_serialize_and_release() {
        let locks = Arc::new(RoomLocks::new());
        let guard = locks.acquire("projA-sess1").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire("projA-sess1").await;
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        locks.release("projA-sess1");
        assert!(locks.is_empty());
    }
}
