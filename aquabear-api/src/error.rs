use aquabear_core::session::{AuthError, GateState, LOGIN_PATH};
use aquabear_core::{BookingError, ConsoleError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No valid staff session; the client should go to the login page.
    #[error("Staff session required")]
    SessionRequired,

    #[error("{}", .0.user_message())]
    Login(AuthError),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    NotFoundError(String),

    #[error("{0}")]
    ConflictError(String),

    /// The store rejected or never answered a write. Nothing was applied.
    #[error("{0}")]
    UpstreamError(String),

    #[error("{0}")]
    InternalServerError(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::SessionRequired => (
                StatusCode::UNAUTHORIZED,
                json!(GateState::RedirectToLogin { redirect: LOGIN_PATH }),
            ),
            AppError::Login(err) => {
                let status = match err {
                    AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                    AuthError::Directory(_) => StatusCode::SERVICE_UNAVAILABLE,
                    AuthError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, json!({ "error": err.user_message() }))
            }
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::UpstreamError(msg) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": msg, "applied": false }),
            ),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ConsoleError> for AppError {
    fn from(err: ConsoleError) -> Self {
        match err {
            ConsoleError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            ConsoleError::Busy(_) | ConsoleError::Transition(_) => {
                AppError::ConflictError(err.to_string())
            }
            ConsoleError::Store(_) | ConsoleError::Timeout(_) => {
                AppError::UpstreamError(err.to_string())
            }
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        if err.is_validation() {
            AppError::ValidationError(err.to_string())
        } else {
            AppError::UpstreamError(err.to_string())
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Login(err)
    }
}
