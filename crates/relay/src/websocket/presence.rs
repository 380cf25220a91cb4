//! Presence accounting
//!
//! Counts sessions and agents per room from a membership snapshot. Results are
//! advisory: membership can change as soon as the snapshot is taken.

use std::sync::Arc;

use assist_shared::{ConnectionId, PeerAddress};
use serde_json::Value;

use super::directory::RoomDirectory;

/// Sessions/agents currently joined to a room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceCount {
    pub sessions: i64,
    pub agents: i64,
}

impl PresenceCount {
    /// Sentinel for a room with no recorded members at all
    pub const ABSENT: PresenceCount = PresenceCount {
        sessions: -1,
        agents: -1,
    };

    pub fn is_absent(&self) -> bool {
        *self == Self::ABSENT
    }
}

#[derive(Clone)]
pub struct PresenceAccountant {
    directory: Arc<dyn RoomDirectory>,
}

impl PresenceAccountant {
    pub fn new(directory: Arc<dyn RoomDirectory>) -> Self {
        Self { directory }
    }

    /// Role totals for a room, or [`PresenceCount::ABSENT`] when the room has
    /// no members
    pub async fn count(&self, room_id: &str) -> PresenceCount {
        let members = self.directory.list_members(room_id).await;
        if members.is_empty() {
            return PresenceCount::ABSENT;
        }

        let sessions = members.iter().filter(|c| c.is_session()).count() as i64;
        PresenceCount {
            sessions,
            agents: members.len() as i64 - sessions,
        }
    }

    pub async fn list_agent_ids(&self, room_id: &str) -> Vec<ConnectionId> {
        self.directory
            .list_members(room_id)
            .await
            .iter()
            .filter(|c| c.is_agent())
            .map(|c| c.id)
            .collect()
    }

    /// Session connection an agent event should go to.
    ///
    /// Without a tab id the first session found wins, which is what clients
    /// predating multi-tab support rely on. A tab id that is present but not
    /// a string never matches.
    pub async fn find_session_connection(
        &self,
        room_id: &str,
        tab_id: Option<&Value>,
    ) -> Option<ConnectionId> {
        self.directory
            .list_members(room_id)
            .await
            .iter()
            .filter(|c| c.is_session())
            .find(|c| match tab_id {
                None => true,
                Some(tab) => tab.as_str() == Some(c.tab_id.as_str()),
            })
            .map(|c| c.id)
    }

    /// Any member of any room under `project_key` already holding `tab_id`
    pub async fn find_tab_owner(&self, project_key: &str, tab_id: &str) -> Option<ConnectionId> {
        for room_id in self.directory.room_ids().await {
            let in_project = PeerAddress::parse(&room_id)
                .map(|addr| addr.project_key == project_key)
                .unwrap_or(false);
            if !in_project {
                continue;
            }

            let members = self.directory.list_members(&room_id).await;
            if let Some(owner) = members.iter().find(|c| c.tab_id == tab_id) {
                return Some(owner.id);
            }
        }
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::websocket::connection::Connection;
    use crate::websocket::events::Outbound;
    use crate::websocket::room::RoomManager;
    use assist_shared::{AddressResolver, Role};
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Fixture {
        rooms: Arc<RoomManager>,
        presence: PresenceAccountant,
        resolver: AddressResolver,
        _receivers: Vec<mpsc::UnboundedReceiver<Outbound>>,
    }

    impl Fixture {
        fn new() -> Self {
            let rooms = Arc::new(RoomManager::new());
            Self {
                presence: PresenceAccountant::new(rooms.clone()),
                rooms,
                resolver: AddressResolver::seeded(None, 5),
                _receivers: Vec::new(),
            }
        }

        async fn join(&mut self, token: &str, role: Role) -> Arc<Connection> {
            let (tx, rx) = mpsc::unbounded_channel();
            self._receivers.push(rx);
            let peer = self.resolver.resolve(token).unwrap();
            let conn = Arc::new(Connection::new(peer, role, tx));
            self.rooms.register(Arc::clone(&conn)).await;
            self.rooms.join(Arc::clone(&conn)).await;
            conn
        }
    }

    #[tokio::test]
    async fn test_absent_room() {
        let fx = Fixture::new();
        let count = fx.presence.count("projA-sess1").await;
        assert!(count.is_absent());
        assert_eq!(count, PresenceCount { sessions: -1, agents: -1 });
    }

    #[tokio::test]
    async fn test_counts_follow_joins_and_leaves() {
        let mut fx = Fixture::new();
        let s1 = fx.join("projA-sess1-t1", Role::Session).await;
        fx.join("projA-sess1-t2", Role::Session).await;
        let agent = fx.join("projA-sess1", Role::Agent).await;

        assert_eq!(
            fx.presence.count("projA-sess1").await,
            PresenceCount { sessions: 2, agents: 1 }
        );

        fx.rooms.unregister(agent.id).await;
        assert_eq!(
            fx.presence.count("projA-sess1").await,
            PresenceCount { sessions: 2, agents: 0 }
        );

        fx.rooms.unregister(s1.id).await;
        assert_eq!(
            fx.presence.count("projA-sess1").await,
            PresenceCount { sessions: 1, agents: 0 }
        );
    }

    #[tokio::test]
    async fn test_list_agent_ids() {
        let mut fx = Fixture::new();
        fx.join("projA-sess1-t1", Role::Session).await;
        let a1 = fx.join("projA-sess1", Role::Agent).await;
        let a2 = fx.join("projA-sess1", Role::Agent).await;

        let ids = fx.presence.list_agent_ids("projA-sess1").await;
        assert_eq!(ids, vec![a1.id, a2.id]);
        assert!(fx.presence.list_agent_ids("projB-x").await.is_empty());
    }

    #[tokio::test]
    async fn test_find_session_by_tab() {
        let mut fx = Fixture::new();
        let t1 = fx.join("projA-sess1-t1", Role::Session).await;
        let t2 = fx.join("projA-sess1-t2", Role::Session).await;
        fx.join("projA-sess1", Role::Agent).await;

        assert_eq!(
            fx.presence
                .find_session_connection("projA-sess1", Some(&json!("t2")))
                .await,
            Some(t2.id)
        );
        assert_eq!(
            fx.presence.find_session_connection("projA-sess1", None).await,
            Some(t1.id)
        );
        assert_eq!(
            fx.presence
                .find_session_connection("projA-sess1", Some(&json!("t9")))
                .await,
            None
        );
        for tab in [Value::Null, json!(42)] {
            assert_eq!(
                fx.presence
                    .find_session_connection("projA-sess1", Some(&tab))
                    .await,
                None
            );
        }
        assert_eq!(fx.presence.find_session_connection("empty-room", None).await, None);
    }

    #[tokio::test]
    async fn test_find_tab_owner_scans_whole_project() {
        let mut fx = Fixture::new();
        let owner = fx.join("projA-sess1-shared", Role::Session).await;
        fx.join("projB-sess9-other", Role::Session).await;

        assert_eq!(fx.presence.find_tab_owner("projA", "shared").await, Some(owner.id));
        assert_eq!(fx.presence.find_tab_owner("projB", "shared").await, None);
        assert_eq!(fx.presence.find_tab_owner("projA", "other").await, None);
    }
}
