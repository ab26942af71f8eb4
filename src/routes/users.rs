use axum::{
    extract::State,
    http::StatusCode,
    routing::delete,
    Router,
};
use tracing::info;

use crate::auth::RequireAdmin;
use crate::error::{AppError, AppResult};
use crate::models::DbId;
use crate::{sessions, users, AppState};
use super::input::ApiPath;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/users/{id}", delete(delete_user))
}

/// `DELETE /api/v1/users/{id}` (admin)
///
/// Soft delete: the row stays for audit, login and session validation stop
/// working, and all of the user's sessions are ended.
async fn delete_user(
    State(state): State<AppState>,
    RequireAdmin(auth): RequireAdmin,
    ApiPath(id): ApiPath<DbId>,
) -> AppResult<StatusCode> {
    // ---
    if !users::soft_delete(&state.pool, id).await? {
        return Err(AppError::not_found("User", id));
    }
    let revoked = sessions::invalidate_all(&state.pool, id, None).await?;

    info!(
        "Admin {} deleted user {}, {} session(s) ended",
        auth.user.username, id, revoked
    );
    Ok(StatusCode::NO_CONTENT)
}
