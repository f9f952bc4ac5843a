use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use aquabear_core::calendar::{self, CalendarMonth, CalendarView};
use aquabear_core::notice::TransientNotice;
use aquabear_core::workflow::{self, StaffAction};
use aquabear_core::{dates, ConsoleView, StatusChange, StatusCounts, StatusFilter};
use aquabear_shared::{Reservation, ReservationStatus};
use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, middleware::staff_gate, state::AppState, stream};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: StatusFilter,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ReservationDetail {
    pub reservation: Reservation,
    pub actions: &'static [StaffAction],
    pub busy: bool,
}

#[derive(Debug, Serialize)]
pub struct DaySelection {
    pub date: String,
    pub reservations: Vec<Reservation>,
    /// Set only when exactly one reservation falls on the day.
    pub detail: Option<Reservation>,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: Uuid,
}

#[derive(Debug, Serialize)]
pub struct NoticeResponse {
    pub notice: Option<TransientNotice>,
}

#[derive(Debug, Serialize)]
pub struct DismissResponse {
    pub dismissed: Option<Uuid>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/reservations", get(list_reservations))
        .route("/v1/admin/reservations/refresh", post(refresh))
        .route(
            "/v1/admin/reservations/{id}",
            get(get_reservation).delete(remove_reservation),
        )
        .route("/v1/admin/reservations/{id}/confirm", post(confirm_reservation))
        .route("/v1/admin/reservations/{id}/cancel", post(cancel_reservation))
        .route("/v1/admin/counts", get(counts))
        .route("/v1/admin/calendar", get(month_calendar))
        .route("/v1/admin/calendar/{date}", get(select_day))
        .route("/v1/admin/notification", get(active_notice).delete(dismiss_notice))
        .route("/v1/admin/stream", get(stream::console_stream))
        .route_layer(axum::middleware::from_fn_with_state(state, staff_gate))
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_reservations(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<ConsoleView> {
    Json(state.console.view(query.status).await)
}

async fn refresh(State(state): State<AppState>) -> Result<Json<RefreshResponse>, AppError> {
    let count = state.console.load_all().await?;
    Ok(Json(RefreshResponse { count }))
}

async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationDetail>, AppError> {
    let reservation = state
        .console
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFoundError(format!("Reservation not found: {}", id)))?;

    Ok(Json(ReservationDetail {
        actions: workflow::available_actions(reservation.status),
        busy: state.console.is_busy(id),
        reservation,
    }))
}

async fn confirm_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusChange>, AppError> {
    let change = state
        .console
        .set_status(id, ReservationStatus::Confirmed)
        .await?;
    Ok(Json(change))
}

async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusChange>, AppError> {
    let change = state
        .console
        .set_status(id, ReservationStatus::Cancelled)
        .await?;
    Ok(Json(change))
}

async fn remove_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RemovedResponse>, AppError> {
    let removed = state.console.remove(id).await?;
    Ok(Json(RemovedResponse { removed: removed.id }))
}

async fn counts(State(state): State<AppState>) -> Json<StatusCounts> {
    Json(state.console.counts().await)
}

async fn month_calendar(
    State(state): State<AppState>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarView>, AppError> {
    let today = Local::now().date_naive();
    let month = match (query.year, query.month) {
        (None, None) => CalendarMonth::containing(today),
        (year, month) => {
            let current = CalendarMonth::containing(today);
            let year = year.unwrap_or(current.year);
            let month = month.unwrap_or(current.month);
            CalendarMonth::new(year, month).ok_or_else(|| {
                AppError::ValidationError(format!("Mes inválido: {}-{:02}", year, month))
            })?
        }
    };

    Ok(Json(state.console.calendar(month, today).await))
}

async fn select_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DaySelection>, AppError> {
    let date = dates::parse_iso(&date)
        .map(dates::to_iso)
        .ok_or_else(|| AppError::ValidationError(format!("Fecha inválida: {}", date)))?;

    let all = state.console.snapshot(StatusFilter::All).await;
    let reservations: Vec<Reservation> = calendar::bucket(&all, &date).into_iter().cloned().collect();
    let detail = calendar::select_day(&all, &date);

    Ok(Json(DaySelection {
        date,
        reservations,
        detail,
    }))
}

async fn active_notice(State(state): State<AppState>) -> Json<NoticeResponse> {
    Json(NoticeResponse {
        notice: state.console.active_notice().await,
    })
}

async fn dismiss_notice(State(state): State<AppState>) -> Json<DismissResponse> {
    Json(DismissResponse {
        dismissed: state.console.dismiss_notice().await,
    })
}
