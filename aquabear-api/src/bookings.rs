use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use aquabear_core::booking::{self, TimeSlot};
use aquabear_core::{dates, BookingRequest};
use aquabear_shared::ServiceType;
use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ServiceOption {
    pub value: String,
    pub label: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub date: String,
    pub bookable: bool,
    pub slots: Vec<TimeSlot>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub success: bool,
    pub reservation_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/services", get(list_services))
        .route("/v1/availability", get(availability))
        .route("/v1/reservations", post(create_reservation))
}

async fn list_services() -> Json<Vec<ServiceOption>> {
    let services = ServiceType::known()
        .into_iter()
        .filter_map(|service| {
            service.form_label().map(|label| ServiceOption {
                value: service.code().to_string(),
                label,
            })
        })
        .collect();
    Json(services)
}

async fn availability(Query(query): Query<AvailabilityQuery>) -> Result<Json<AvailabilityResponse>, AppError> {
    let date = dates::parse_iso(&query.date)
        .ok_or_else(|| AppError::ValidationError(format!("Fecha inválida: {}", query.date)))?;
    let now = Local::now().naive_local();

    Ok(Json(AvailabilityResponse {
        date: dates::to_iso(date),
        bookable: booking::is_date_bookable(date, now.date()),
        slots: booking::available_slots(date, now),
    }))
}

async fn create_reservation(
    State(state): State<AppState>,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let reservation = state
        .intake
        .submit(&req, Local::now().naive_local())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            success: true,
            reservation_id: reservation.id,
        }),
    ))
}
