//! Session listing, logout and the cleanup sweep.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::{RequireAdmin, RequireViewer};
use crate::error::{AppError, AppResult};
use crate::models::SessionInfo;
use crate::{sessions, AppState};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/sessions/active", get(active_sessions))
        .route("/sessions/logout", post(logout))
        .route("/sessions/logout-all", post(logout_all))
        .route("/sessions/cleanup", post(cleanup))
}

/// `GET /api/v1/sessions/active`
async fn active_sessions(
    State(state): State<AppState>,
    RequireViewer(auth): RequireViewer,
) -> AppResult<Json<Vec<SessionInfo>>> {
    // ---
    let rows = sessions::list_active(&state.pool, auth.user.id).await?;
    let now = Utc::now();
    let infos = rows
        .into_iter()
        .map(|s| SessionInfo::from_session(s, &auth.token, now))
        .collect();
    Ok(Json(infos))
}

/// `POST /api/v1/sessions/logout`
async fn logout(
    State(state): State<AppState>,
    RequireViewer(auth): RequireViewer,
) -> AppResult<Json<Value>> {
    // ---
    if !sessions::invalidate(&state.pool, &auth.token).await? {
        // Lost a race with a concurrent logout of the same token
        return Err(AppError::Unauthorized("Invalid session".into()));
    }
    info!("User {} logged out", auth.user.username);
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// `POST /api/v1/sessions/logout-all`
///
/// Ends every other session of the caller; the current one stays valid.
async fn logout_all(
    State(state): State<AppState>,
    RequireViewer(auth): RequireViewer,
) -> AppResult<Json<Value>> {
    // ---
    let revoked = sessions::invalidate_all(&state.pool, auth.user.id, Some(&auth.token)).await?;
    info!("User {} ended {} other session(s)", auth.user.username, revoked);
    Ok(Json(json!({
        "message": "Logged out from all other sessions",
        "revoked": revoked,
    })))
}

/// `POST /api/v1/sessions/cleanup` (admin)
async fn cleanup(
    State(state): State<AppState>,
    _auth: RequireAdmin,
) -> AppResult<Json<Value>> {
    // ---
    let deleted = sessions::cleanup_expired(&state.pool).await?;
    info!("Session cleanup removed {} row(s)", deleted);
    Ok(Json(json!({ "deleted": deleted })))
}
