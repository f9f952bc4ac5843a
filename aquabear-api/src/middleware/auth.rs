use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};

use crate::{auth::session_from_token, error::AppError, state::AppState};

/// Browsers cannot set headers on an `EventSource`, so the console stream
/// may pass its token as `?access_token=`.
fn query_token(req: &Request) -> Option<String> {
    req.uri()
        .query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("access_token="))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Staff Session Gate
// ============================================================================

/// Admits the request only with a live staff session, which is then
/// available to handlers as `Extension<StaffSession>`. Anything else gets
/// 401 with a redirect to the login page before any handler runs.
pub async fn staff_gate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .or_else(|| query_token(&req));

    let Some(session) = token.and_then(|t| session_from_token(&state, &t)) else {
        tracing::debug!(path = %req.uri().path(), "No staff session, redirecting to login");
        return AppError::SessionRequired.into_response();
    };

    req.extensions_mut().insert(session);
    next.run(req).await
}
