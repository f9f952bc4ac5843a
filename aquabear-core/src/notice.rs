use async_trait::async_trait;
use aquabear_shared::Reservation;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Banner for the most recent realtime arrival. Only one exists at a time;
/// a newer arrival replaces it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransientNotice {
    pub reservation: Reservation,
    pub shown_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TransientNotice {
    pub fn new(reservation: Reservation, lifetime: Duration) -> Self {
        let shown_at = Utc::now();
        let lifetime = chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::zero());
        Self {
            reservation,
            shown_at,
            expires_at: shown_at + lifetime,
        }
    }

    pub fn reservation_id(&self) -> uuid::Uuid {
        self.reservation.id
    }
}

/// Audible cue played when a reservation arrives. Failures are reported back
/// to the console, which ignores them.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn play(&self, reservation: &Reservation) -> Result<(), AlertError>;
}

#[derive(Debug, thiserror::Error)]
#[error("Alert playback failed: {0}")]
pub struct AlertError(pub String);

/// Plays nothing.
pub struct SilentAlerts;

#[async_trait]
impl AlertSink for SilentAlerts {
    async fn play(&self, _reservation: &Reservation) -> Result<(), AlertError> {
        Ok(())
    }
}
