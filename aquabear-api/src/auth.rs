use std::collections::HashMap;
use std::sync::Mutex;

use aquabear_core::session::{AuthError, GateState, StaffSession, LOGIN_PATH};
use aquabear_store::app_config::StaffAccountConfig;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, middleware::auth::staff_gate, state::AppState, state::AuthConfig};

pub const STAFF_ROLE: &str = "STAFF";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StaffClaims {
    pub sub: String,
    pub jti: Uuid,
    pub role: String,
    pub iat: usize,
    pub exp: usize,
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Staff credentials, keyed by lowercase email.
#[derive(Default)]
pub struct StaffDirectory {
    accounts: HashMap<String, String>,
}

impl StaffDirectory {
    pub fn from_config(accounts: &[StaffAccountConfig]) -> anyhow::Result<Self> {
        let mut directory = StaffDirectory::default();
        for account in accounts {
            let hash = match (&account.password_hash, &account.password) {
                (Some(hash), _) => {
                    PasswordHash::new(hash).map_err(|e| {
                        anyhow::anyhow!("invalid password hash for {}: {}", account.email, e)
                    })?;
                    hash.clone()
                }
                (None, Some(password)) => {
                    tracing::warn!(
                        email = %account.email,
                        "Staff account configured with a plaintext password; store a password_hash instead"
                    );
                    hash_password(password).map_err(|e| anyhow::anyhow!("hashing failed: {}", e))?
                }
                (None, None) => {
                    anyhow::bail!("staff account {} has no password", account.email);
                }
            };
            directory.insert_hash(&account.email, hash);
        }
        Ok(directory)
    }

    pub fn insert_hash(&mut self, email: &str, password_hash: String) {
        self.accounts.insert(email.trim().to_lowercase(), password_hash);
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Check a login attempt. Hashing is CPU-bound, so it runs off the
    /// async workers.
    pub async fn verify(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email = email.trim().to_lowercase();
        let stored = self
            .accounts
            .get(&email)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;
        let password = password.to_string();

        let matched = tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&stored).map_err(|e| AuthError::Other(e.to_string()))?;
            Ok::<bool, AuthError>(
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok(),
            )
        })
        .await
        .map_err(|e| AuthError::Directory(e.to_string()))??;

        if matched {
            Ok(email)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Token ids signed out before their expiry.
#[derive(Default)]
pub struct RevocationList {
    revoked: Mutex<HashMap<Uuid, DateTime<Utc>>>,
}

impl RevocationList {
    pub fn revoke(&self, session_id: Uuid, expires_at: DateTime<Utc>) {
        let now = Utc::now();
        let mut revoked = self.revoked.lock().unwrap_or_else(|e| e.into_inner());
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(session_id, expires_at);
    }

    pub fn is_revoked(&self, session_id: Uuid) -> bool {
        self.revoked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&session_id)
    }
}

pub fn issue_token(auth: &AuthConfig, email: &str) -> Result<(String, StaffSession), AppError> {
    let now = Utc::now();
    let expires_at = now + Duration::seconds(auth.expiration as i64);
    let claims = StaffClaims {
        sub: email.to_string(),
        jti: Uuid::new_v4(),
        role: STAFF_ROLE.to_owned(),
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))?;

    Ok((
        token,
        StaffSession {
            email: claims.sub,
            session_id: claims.jti,
            expires_at,
        },
    ))
}

/// Decode a bearer token into a live session. Expired, malformed, foreign
/// and signed-out tokens all yield `None`.
pub fn session_from_token(state: &AppState, token: &str) -> Option<StaffSession> {
    let data = decode::<StaffClaims>(
        token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    let claims = data.claims;
    if claims.role != STAFF_ROLE || state.revoked.is_revoked(claims.jti) {
        return None;
    }

    Some(StaffSession {
        email: claims.sub,
        session_id: claims.jti,
        expires_at: DateTime::from_timestamp(claims.exp as i64, 0)?,
    })
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    email: String,
    expires_at: DateTime<Utc>,
    redirect: &'static str,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/auth/login", post(login))
}

/// Routes that need a session; mounted behind the gate.
pub fn session_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/auth/session", get(current_session))
        .route("/v1/auth/logout", post(logout))
        .route_layer(axum::middleware::from_fn_with_state(state, staff_gate))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = match state.staff.verify(&req.email, &req.password).await {
        Ok(email) => email,
        Err(e) => {
            tracing::info!(error = %e, "Staff login rejected");
            return Err(e.into());
        }
    };

    let (token, session) = issue_token(&state.auth, &email)?;
    tracing::info!(email = %session.email, "Staff signed in");

    Ok(Json(LoginResponse {
        token,
        email: session.email,
        expires_at: session.expires_at,
        redirect: aquabear_core::session::CONSOLE_PATH,
    }))
}

async fn current_session(Extension(session): Extension<StaffSession>) -> Json<GateState> {
    Json(GateState::evaluate(Some(&session), Utc::now()))
}

async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<StaffSession>,
) -> Json<serde_json::Value> {
    state.revoked.revoke(session.session_id, session.expires_at);
    tracing::info!(email = %session.email, "Staff signed out");
    Json(serde_json::json!({ "redirect": LOGIN_PATH }))
}
