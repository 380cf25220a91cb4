//! Periodic room audit
//!
//! Logs how many rooms exist and how many of them are well-formed assist
//! rooms. Purely diagnostic: it never changes membership.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use assist_shared::{AssistError, PeerAddress};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::directory::RoomDirectory;

/// Totals from one audit pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub total_rooms: usize,
    /// Rooms named `<projectKey>-<sessionId>` that are not a member's own id
    pub valid_rooms: usize,
}

pub struct RoomAudit {
    directory: Arc<dyn RoomDirectory>,
}

impl RoomAudit {
    pub fn new(directory: Arc<dyn RoomDirectory>) -> Self {
        Self { directory }
    }

    /// Run [`RoomAudit::run_once`] every `period` until the task is aborted.
    /// The first pass happens one full period after start.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                interval.tick().await;
                let audit = Arc::clone(&self);
                if let Err(e) = tokio::spawn(async move { audit.run_once().await }).await {
                    let err = AssistError::Advisory(e.to_string());
                    tracing::warn!(error = %err, "Room audit pass failed");
                }
            }
        })
    }

    pub async fn run_once(&self) -> AuditReport {
        let rooms = self.directory.rooms().await;
        let member_ids: HashSet<String> = rooms
            .iter()
            .flat_map(|room| room.member_ids.iter().map(|id| id.to_string()))
            .collect();

        let mut report = AuditReport {
            total_rooms: rooms.len(),
            valid_rooms: 0,
        };

        for room in &rooms {
            let valid =
                !member_ids.contains(&room.room_id) && PeerAddress::parse(&room.room_id).is_ok();
            if valid {
                report.valid_rooms += 1;
            }
            tracing::debug!(
                room_id = %room.room_id,
                members = room.member_ids.len(),
                valid,
                "Audited room"
            );
        }

        tracing::info!(
            total_rooms = report.total_rooms,
            valid_rooms = report.valid_rooms,
            "Room audit"
        );
        report
    }
}
