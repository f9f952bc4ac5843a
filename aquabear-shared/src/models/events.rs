use uuid::Uuid;

use super::reservation::{Reservation, ReservationStatus};

/// A row newly inserted into the reservation store, delivered verbatim by the
/// realtime feed.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct InsertEvent {
    pub record: Reservation,
}

/// Changes to the console cache, fanned out to every connected staff stream.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsoleEvent {
    Inserted { reservation: Reservation },
    StatusChanged { id: Uuid, status: ReservationStatus },
    Removed { id: Uuid },
    NoticeCleared { id: Uuid },
    Refreshed { count: usize },
    Alert { id: Uuid },
    /// The stream fell behind and dropped events; reload the console.
    Resync { skipped: u64 },
}

impl ConsoleEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ConsoleEvent::Inserted { .. } => "inserted",
            ConsoleEvent::StatusChanged { .. } => "status_changed",
            ConsoleEvent::Removed { .. } => "removed",
            ConsoleEvent::NoticeCleared { .. } => "notice_cleared",
            ConsoleEvent::Refreshed { .. } => "refreshed",
            ConsoleEvent::Alert { .. } => "alert",
            ConsoleEvent::Resync { .. } => "resync",
        }
    }
}
