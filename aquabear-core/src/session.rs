//! Staff session gate.
//!
//! No reservation data is read until a session has been verified. An absent or
//! expired session is an expected outcome that routes the caller to the login
//! entry point; it is not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const LOGIN_PATH: &str = "/login";
pub const CONSOLE_PATH: &str = "/admin";

/// A verified staff session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaffSession {
    pub email: String,
    /// Token id, used for revocation on sign-out.
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl StaffSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Outcome of checking for a session before the console renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateState {
    RedirectToLogin { redirect: &'static str },
    Admitted { email: String },
}

impl GateState {
    pub fn evaluate(session: Option<&StaffSession>, now: DateTime<Utc>) -> Self {
        match session {
            Some(session) if !session.is_expired(now) => GateState::Admitted {
                email: session.email.clone(),
            },
            _ => GateState::RedirectToLogin {
                redirect: LOGIN_PATH,
            },
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, GateState::Admitted { .. })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("Database error: {0}")]
    Directory(String),
    #[error("Authentication failed: {0}")]
    Other(String),
}

impl AuthError {
    /// Message shown on the login form. Every variant is recoverable by
    /// retrying.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "Correo o contraseña incorrectos",
            AuthError::Directory(_) => "Error de conexión. Por favor intenta de nuevo.",
            AuthError::Other(_) => "Ocurrió un error al iniciar sesión",
        }
    }
}
