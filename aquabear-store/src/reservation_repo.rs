use async_trait::async_trait;
use aquabear_core::repository::{InsertSubscription, ReservationStore};
use aquabear_core::{StoreError, StoreResult};
use aquabear_shared::{InsertEvent, Masked, NewReservation, Reservation, ReservationStatus, ServiceType};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Channel the insert trigger publishes new rows on.
pub const INSERT_CHANNEL: &str = "reservations_changes";

const COLUMNS: &str = "id, name, email, phone, service_type, \
     reservation_date::text AS reservation_date, reservation_time, \
     participants, notes, status, created_at";

pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    name: String,
    email: String,
    phone: String,
    service_type: String,
    reservation_date: String,
    reservation_time: String,
    participants: i32,
    notes: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let status: ReservationStatus = row
            .status
            .parse()
            .map_err(|e| StoreError::Malformed(format!("reservation {}: {}", row.id, e)))?;

        Ok(Reservation {
            id: row.id,
            name: row.name,
            email: Masked::new(row.email),
            phone: Masked::new(row.phone),
            service_type: ServiceType::from_code(&row.service_type),
            reservation_date: row.reservation_date,
            reservation_time: row.reservation_time,
            participants: row.participants,
            notes: row.notes,
            status,
            created_at: row.created_at,
        })
    }
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

/// Trigger payload. NOTIFY is size-capped, so only the id travels and the
/// row is read back.
#[derive(Debug, Deserialize)]
struct InsertNotice {
    id: Uuid,
}

fn parse_insert_payload(payload: &str) -> Result<Uuid, serde_json::Error> {
    serde_json::from_str::<InsertNotice>(payload).map(|notice| notice.id)
}

async fn fetch_by_id(pool: &PgPool, id: Uuid) -> StoreResult<Option<Reservation>> {
    let row = sqlx::query_as::<_, ReservationRow>(&format!(
        "SELECT {COLUMNS} FROM reservations WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(map_sqlx)?;

    row.map(Reservation::try_from).transpose()
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn list_all(&self) -> StoreResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {COLUMNS} FROM reservations ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter().map(Reservation::try_from).collect()
    }

    async fn insert(&self, reservation: &NewReservation) -> StoreResult<Reservation> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            r#"
            INSERT INTO reservations
                (name, email, phone, service_type, reservation_date, reservation_time, participants, notes, status)
            VALUES ($1, $2, $3, $4, $5::date, $6, $7, $8, 'pending')
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&reservation.name)
        .bind(reservation.email.expose())
        .bind(reservation.phone.expose())
        .bind(reservation.service_type.code())
        .bind(&reservation.reservation_date)
        .bind(&reservation.reservation_time)
        .bind(reservation.participants)
        .bind(&reservation.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Reservation::try_from(row)
    }

    async fn update_status(&self, id: Uuid, status: ReservationStatus) -> StoreResult<()> {
        let result = sqlx::query("UPDATE reservations SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn subscribe_inserts(&self) -> StoreResult<InsertSubscription> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(map_sqlx)?;
        listener.listen(INSERT_CHANNEL).await.map_err(map_sqlx)?;

        let (tx, rx) = mpsc::channel(64);
        let pool = self.pool.clone();
        let feeder = tokio::spawn(async move {
            loop {
                let id = match listener.recv().await {
                    Ok(notification) => match parse_insert_payload(notification.payload()) {
                        Ok(id) => id,
                        Err(e) => {
                            tracing::warn!(error = %e, "Skipping malformed insert notification");
                            continue;
                        }
                    },
                    Err(e) => {
                        // The listener reconnects on the next recv.
                        tracing::error!(error = %e, "Insert listener lost its connection");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };

                match fetch_by_id(&pool, id).await {
                    Ok(Some(record)) => {
                        if tx.send(InsertEvent { record }).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(reservation_id = %id, "Inserted reservation already gone");
                    }
                    Err(e) => {
                        tracing::warn!(reservation_id = %id, error = %e, "Failed to read inserted reservation");
                    }
                }
            }
        });

        tracing::info!(channel = INSERT_CHANNEL, "Subscribed to reservation inserts");
        Ok(InsertSubscription::new(INSERT_CHANNEL, rx, feeder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str) -> ReservationRow {
        ReservationRow {
            id: Uuid::new_v4(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            phone: "5215512345678".into(),
            service_type: "kids".into(),
            reservation_date: "2026-10-24".into(),
            reservation_time: "10:00".into(),
            participants: 2,
            notes: None,
            status: status.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rows_convert_to_reservations() {
        let reservation = Reservation::try_from(row("confirmed")).unwrap();
        assert_eq!(reservation.status, ReservationStatus::Confirmed);
        assert_eq!(reservation.service_type, ServiceType::Kids);
        assert_eq!(reservation.email.expose(), "ana@example.com");
    }

    #[test]
    fn unknown_status_is_malformed() {
        assert!(matches!(
            Reservation::try_from(row("archived")),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn trigger_payload_carries_only_the_id() {
        let id = parse_insert_payload(r#"{"id": "3f2b8a4e-8a43-4a57-9a0e-1b2c3d4e5f60"}"#).unwrap();
        assert_eq!(id.to_string(), "3f2b8a4e-8a43-4a57-9a0e-1b2c3d4e5f60");

        assert!(parse_insert_payload("{\"id\": 1}").is_err());
        assert!(parse_insert_payload("not json").is_err());
    }
}
