//! Password change (self-service) and reset (admin token).

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use crate::auth::{authenticate, password, RequireViewer};
use crate::error::{AppError, AppResult};
use crate::models::Role;
use crate::{sessions, users, AppState};
use super::input::ApiJson;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/password/change-password", post(change_password))
        .route("/password/reset-password", post(reset_password))
}

#[derive(Debug, Deserialize, Validate)]
struct PasswordChange {
    old_password: String,
    #[validate(length(min = 8))]
    new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
struct PasswordReset {
    username: String,
    #[validate(length(min = 8))]
    new_password: String,
    admin_token: Option<String>,
}

/// `POST /api/v1/password/change-password`
///
/// Other sessions of the caller are ended; the current one stays valid.
async fn change_password(
    State(state): State<AppState>,
    RequireViewer(auth): RequireViewer,
    ApiJson(input): ApiJson<PasswordChange>,
) -> AppResult<Json<Value>> {
    // ---
    input.validate()?;

    if !password::verify_password(&input.old_password, &auth.user.hashed_password)? {
        return Err(AppError::InvalidCredentials(
            "Current password is incorrect".into(),
        ));
    }

    let hashed = password::hash_password(&input.new_password)?;
    users::update_password(&state.pool, auth.user.id, &hashed).await?;
    let revoked = sessions::invalidate_all(&state.pool, auth.user.id, Some(&auth.token)).await?;

    info!(
        "User {} changed password, {} other session(s) ended",
        auth.user.username, revoked
    );
    Ok(Json(json!({ "message": "Password updated successfully" })))
}

/// `POST /api/v1/password/reset-password`
///
/// Authorized by `admin_token`, the bearer token of a live admin session.
/// Every session of the target user is ended.
async fn reset_password(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<PasswordReset>,
) -> AppResult<Json<Value>> {
    // ---
    let Some(admin_token) = input.admin_token.as_deref() else {
        return Err(AppError::Forbidden(
            "Admin token required for password reset".into(),
        ));
    };

    let admin = match authenticate(&state, admin_token).await {
        Ok(user) if user.role.satisfies(Role::Admin) => user,
        Ok(_) | Err(AppError::Unauthorized(_)) => {
            return Err(AppError::InvalidCredentials("Invalid admin token".into()));
        }
        Err(e) => return Err(e),
    };

    input.validate()?;

    let target = users::find_by_username(&state.pool, &input.username)
        .await?
        .ok_or_else(|| AppError::InvalidCredentials(format!("User {} not found", input.username)))?;

    let hashed = password::hash_password(&input.new_password)?;
    users::update_password(&state.pool, target.id, &hashed).await?;
    let revoked = sessions::invalidate_all(&state.pool, target.id, None).await?;

    info!(
        "Admin {} reset password for {}, {} session(s) ended",
        admin.username, target.username, revoked
    );
    Ok(Json(json!({ "message": "Password reset successful" })))
}
