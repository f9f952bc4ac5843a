use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use aquabear_core::BookingNotification;
use serde_json::{json, Value};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/notifications", post(send_notification))
}

async fn send_notification(
    State(state): State<AppState>,
    Json(notification): Json<BookingNotification>,
) -> (StatusCode, Json<Value>) {
    match state.dispatcher.dispatch(&notification).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "success": true }))),
        Err(e) => {
            tracing::error!(error = %e, "Error sending notification email");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Error al enviar correo" })),
            )
        }
    }
}
