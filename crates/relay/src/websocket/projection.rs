//! Read-only views of live sessions
//!
//! Backs the `/sockets-list` and `/sockets-live` routes.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use assist_shared::{PeerAddress, SessionInfo};

use super::directory::RoomDirectory;

#[derive(Clone)]
pub struct SessionProjection {
    directory: Arc<dyn RoomDirectory>,
}

impl SessionProjection {
    pub fn new(directory: Arc<dyn RoomDirectory>) -> Self {
        Self { directory }
    }

    /// Session ids with at least one member, grouped by project key
    pub async fn session_ids_by_project(&self) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for room_id in self.directory.room_ids().await {
            if let Ok(addr) = PeerAddress::parse(&room_id) {
                grouped.entry(addr.project_key).or_default().push(addr.session_id);
            }
        }
        for ids in grouped.values_mut() {
            ids.sort();
            ids.dedup();
        }
        grouped
    }

    pub async fn session_ids(&self, project_key: &str) -> Vec<String> {
        self.session_ids_by_project()
            .await
            .remove(project_key)
            .unwrap_or_default()
    }

    pub async fn find_session_id(&self, project_key: &str, session_id: &str) -> Option<String> {
        self.session_ids(project_key)
            .await
            .into_iter()
            .find(|id| id == session_id)
    }

    /// Session info of every live session, one entry per `sessionID`
    pub async fn live_by_project(&self) -> BTreeMap<String, Vec<SessionInfo>> {
        let mut grouped: BTreeMap<String, Vec<SessionInfo>> = BTreeMap::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        let mut room_ids = self.directory.room_ids().await;
        room_ids.sort();

        for room_id in room_ids {
            let Ok(addr) = PeerAddress::parse(&room_id) else {
                continue;
            };

            for member in self.directory.list_members(&room_id).await {
                let Some(info) = member.session_info_snapshot().await else {
                    continue;
                };
                let session_id = info.session_id().unwrap_or_else(|| addr.session_id.clone());
                if seen.insert((addr.project_key.clone(), session_id)) {
                    grouped.entry(addr.project_key.clone()).or_default().push(info);
                }
            }
        }
        grouped
    }

    pub async fn live(&self, project_key: &str) -> Vec<SessionInfo> {
        self.live_by_project()
            .await
            .remove(project_key)
            .unwrap_or_default()
    }

    pub async fn live_session(&self, project_key: &str, session_id: &str) -> Option<SessionInfo> {
        self.live(project_key)
            .await
            .into_iter()
            .find(|info| info.session_id().as_deref() == Some(session_id))
    }
}
