//! Registration, login and identity endpoints.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::auth::{authenticate, bearer_token, jwt, password, RequireViewer};
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, Role, User};
use crate::sessions::{self, ClientInfo};
use crate::{users, AppState};
use super::input::ApiJson;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/token", post(login))
        .route("/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
}

/// Role granted to a new account. Anything above viewer needs open role
/// registration or an admin caller.
fn granted_role(requested: Option<Role>, open: bool, caller: Option<Role>) -> AppResult<Role> {
    // ---
    let role = requested.unwrap_or_default();
    if role == Role::Viewer || open || caller.is_some_and(|r| r.satisfies(Role::Admin)) {
        Ok(role)
    } else {
        Err(AppError::Forbidden(format!(
            "Only an admin can register a {} account",
            role.as_str()
        )))
    }
}

/// `POST /api/v1/auth/register`
///
/// Public. An optional bearer token identifies an admin creating an
/// elevated account.
async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(mut input): ApiJson<NewUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    // ---
    input.username = input.username.trim().to_string();
    input.email = input.email.trim().to_string();
    input.validate()?;

    let caller = match bearer_token(&headers) {
        Some(token) => authenticate(&state, token).await.ok().map(|u| u.role),
        None => None,
    };
    let role = granted_role(input.role, state.config.open_role_registration, caller)?;

    let hashed = password::hash_password(&input.password)?;
    let user = users::create(&state.pool, &input.email, &input.username, &hashed, role).await?;

    info!("Registered user {} ({}) as {}", user.username, user.id, role.as_str());
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /api/v1/auth/token`
///
/// Verifies the password, signs an access token and opens a session bound to
/// it, recording the caller's user agent and address.
async fn login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    // ---
    let rejected = || AppError::Unauthorized("Incorrect username or password".into());

    let username = input.username.trim();
    let user = users::find_by_username(&state.pool, username)
        .await?
        .ok_or_else(rejected)?;

    if !user.is_active || !password::verify_password(&input.password, &user.hashed_password)? {
        info!("Rejected login for {}", username);
        return Err(rejected());
    }

    let token = jwt::issue(
        user.id,
        user.role,
        &state.config.jwt_secret,
        state.config.access_token_expire_minutes,
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))?;

    let client = ClientInfo {
        device_info: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ip_address: Some(peer.ip().to_string()),
    };
    let session = sessions::create(&state.pool, user.id, &token, &client).await?;

    info!("User {} logged in, session {}", user.username, session.id);
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer",
    }))
}

/// `GET /api/v1/auth/me`
async fn me(RequireViewer(auth): RequireViewer) -> Json<User> {
    Json(auth.user)
}
