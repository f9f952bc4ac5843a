use async_trait::async_trait;
use aquabear_shared::{InsertEvent, NewReservation, Reservation, ReservationStatus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::StoreResult;

/// Repository trait for the reservation record store
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Every record, newest `created_at` first.
    async fn list_all(&self) -> StoreResult<Vec<Reservation>>;

    /// Write a new `pending` record. Used only by booking intake.
    async fn insert(&self, reservation: &NewReservation) -> StoreResult<Reservation>;

    async fn update_status(&self, id: Uuid, status: ReservationStatus) -> StoreResult<()>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    /// Open a feed of insert events. The feed stays open until the returned
    /// subscription is dropped or unsubscribed.
    async fn subscribe_inserts(&self) -> StoreResult<InsertSubscription>;
}

/// Open realtime feed of newly inserted reservations.
///
/// The store side runs a feeder task pushing into `events`; dropping the
/// subscription aborts that task so no listener outlives its consumer.
pub struct InsertSubscription {
    channel: String,
    events: mpsc::Receiver<InsertEvent>,
    feeder: Option<JoinHandle<()>>,
}

impl InsertSubscription {
    pub fn new(
        channel: impl Into<String>,
        events: mpsc::Receiver<InsertEvent>,
        feeder: JoinHandle<()>,
    ) -> Self {
        Self {
            channel: channel.into(),
            events,
            feeder: Some(feeder),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Next insert event, or `None` once the feed has closed.
    pub async fn recv(&mut self) -> Option<InsertEvent> {
        self.events.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for InsertSubscription {
    fn drop(&mut self) {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
            tracing::debug!(channel = %self.channel, "Released insert subscription");
        }
    }
}

impl std::fmt::Debug for InsertSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsertSubscription")
            .field("channel", &self.channel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn dropping_the_subscription_stops_the_feeder() {
        let (tx, rx) = mpsc::channel(4);
        let feeder = tokio::spawn(async move {
            let _tx = tx;
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let probe = feeder.abort_handle();

        let subscription = InsertSubscription::new("reservations-changes", rx, feeder);
        assert_eq!(subscription.channel(), "reservations-changes");
        subscription.unsubscribe();

        for _ in 0..10 {
            if probe.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(probe.is_finished());
    }
}
