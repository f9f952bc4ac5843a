use async_trait::async_trait;
use aquabear_shared::Reservation;
use serde::{Deserialize, Serialize};

use crate::dates;

/// Payload handed to the staff notification channel for a new booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingNotification {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    /// Service display name.
    pub service: String,
    /// Long Spanish date.
    pub date: String,
    pub time: String,
    pub participants: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BookingNotification {
    pub fn for_reservation(reservation: &Reservation) -> Self {
        let date = dates::parse_iso(&reservation.reservation_date)
            .map(dates::format_long)
            .unwrap_or_else(|| reservation.reservation_date.clone());

        Self {
            name: reservation.name.clone(),
            phone: reservation.phone.expose().clone(),
            email: reservation.email.expose().clone(),
            service: reservation.service_type.display_name().to_string(),
            date,
            time: reservation.reservation_time.clone(),
            participants: reservation.participants,
            notes: reservation.notes.clone().filter(|n| !n.trim().is_empty()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Notification transport failed: {0}")]
    Transport(String),
    #[error("Notification rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Notification could not be rendered: {0}")]
    Render(String),
}

/// Delivers booking notifications to staff. Fire-and-forget for callers.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: &BookingNotification) -> Result<(), DispatchError>;
}

/// Used when no email transport is configured.
pub struct NoopDispatcher;

#[async_trait]
impl NotificationDispatcher for NoopDispatcher {
    async fn dispatch(&self, notification: &BookingNotification) -> Result<(), DispatchError> {
        tracing::info!(
            client = %notification.name,
            service = %notification.service,
            "Email transport not configured, skipping staff notification"
        );
        Ok(())
    }
}
