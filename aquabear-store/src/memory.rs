use async_trait::async_trait;
use aquabear_core::repository::{InsertSubscription, ReservationStore};
use aquabear_core::{StoreError, StoreResult};
use aquabear_shared::{InsertEvent, NewReservation, Reservation, ReservationStatus};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

pub const MEMORY_CHANNEL: &str = "reservations_changes";

/// Process-local reservation store. Used when no database is configured and
/// by the test suites.
pub struct MemoryReservationStore {
    records: RwLock<Vec<Reservation>>,
    inserts: broadcast::Sender<InsertEvent>,
    offline: AtomicBool,
}

impl Default for MemoryReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        let (inserts, _) = broadcast::channel(256);
        Self {
            records: RwLock::new(Vec::new()),
            inserts,
            offline: AtomicBool::new(false),
        }
    }

    pub async fn with_records(records: Vec<Reservation>) -> Self {
        let store = Self::new();
        *store.records.write().await = records;
        store
    }

    /// Make every call fail as if the backend were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Copy broadcast inserts into a subscription's queue until either side goes
/// away.
async fn forward(mut source: broadcast::Receiver<InsertEvent>, sink: mpsc::Sender<InsertEvent>) {
    loop {
        match source.recv().await {
            Ok(event) => {
                if sink.send(event).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Insert subscriber lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn list_all(&self) -> StoreResult<Vec<Reservation>> {
        self.check_online()?;
        let mut records = self.records.read().await.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn insert(&self, reservation: &NewReservation) -> StoreResult<Reservation> {
        self.check_online()?;
        let record = reservation
            .clone()
            .into_reservation(Uuid::new_v4(), Utc::now());
        self.records.write().await.push(record.clone());

        let _ = self.inserts.send(InsertEvent {
            record: record.clone(),
        });
        Ok(record)
    }

    async fn update_status(&self, id: Uuid, status: ReservationStatus) -> StoreResult<()> {
        self.check_online()?;
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        record.status = status;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.check_online()?;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn subscribe_inserts(&self) -> StoreResult<InsertSubscription> {
        self.check_online()?;
        let (tx, rx) = mpsc::channel(64);
        let feeder = tokio::spawn(forward(self.inserts.subscribe(), tx));
        Ok(InsertSubscription::new(MEMORY_CHANNEL, rx, feeder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquabear_shared::{Masked, ServiceType};

    fn booking(name: &str) -> NewReservation {
        NewReservation {
            name: name.to_string(),
            email: Masked::from("a@example.com"),
            phone: Masked::from("555"),
            service_type: ServiceType::Adult,
            reservation_date: "2026-10-24".to_string(),
            reservation_time: "07:00".to_string(),
            participants: 1,
            notes: None,
        }
    }

    #[tokio::test]
    async fn inserts_start_pending_and_list_newest_first() {
        let store = MemoryReservationStore::new();
        let first = store.insert(&booking("First")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.insert(&booking("Second")).await.unwrap();

        assert_eq!(first.status, ReservationStatus::Pending);
        let all = store.list_all().await.unwrap();
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }

    #[tokio::test]
    async fn subscribers_receive_inserts() {
        let store = MemoryReservationStore::new();
        let mut subscription = store.subscribe_inserts().await.unwrap();

        let record = store.insert(&booking("Ana")).await.unwrap();
        let event = subscription.recv().await.unwrap();
        assert_eq!(event.record, record);
    }

    #[tokio::test]
    async fn missing_ids_and_offline_mode_fail() {
        let store = MemoryReservationStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.delete(id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.update_status(id, ReservationStatus::Confirmed).await,
            Err(StoreError::NotFound(_))
        ));

        store.set_offline(true);
        assert!(matches!(store.list_all().await, Err(StoreError::Unavailable(_))));
        store.set_offline(false);
        assert!(store.list_all().await.unwrap().is_empty());
    }
}
