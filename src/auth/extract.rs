//! Bearer-token extractors for Axum handlers.
//!
//! [`AuthUser`] accepts a request only when its `Authorization: Bearer` token
//! both decodes as a valid JWT and matches an active, unexpired session. The
//! `Require*` wrappers add a minimum-role check on top, using the role stored
//! on the user row rather than the one baked into the token.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use super::jwt;
use crate::error::{AppError, AppResult};
use crate::models::{Role, User};
use crate::{sessions, AppState};

/// Authenticated caller plus the token the request carried.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

/// Pull the token out of an `Authorization: Bearer <token>` header. The
/// scheme name is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    // ---
    let (scheme, token) = headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .trim()
        .split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolve a raw token to its user: signature and expiry first, then the
/// session row (which also bumps `last_activity`).
pub async fn authenticate(state: &AppState, token: &str) -> AppResult<User> {
    // ---
    let claims = jwt::decode_token(token, &state.config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    let user = sessions::validate(&state.pool, token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Session expired or revoked".into()))?;

    if user.id != claims.sub {
        tracing::warn!("Token subject {} does not match session owner {}", claims.sub, user.id);
        return Err(AppError::Unauthorized("Invalid session".into()));
    }
    Ok(user)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // ---
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".into()))?
            .to_string();

        let user = authenticate(state, &token).await?;
        Ok(AuthUser { user, token })
    }
}

/// Declare an extractor admitting callers whose role is at least `$role`.
macro_rules! require_role {
    ($(#[$doc:meta])* $name:ident, $role:expr) => {
        $(#[$doc])*
        pub struct $name(pub AuthUser);

        impl FromRequestParts<AppState> for $name {
            type Rejection = AppError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                let auth = AuthUser::from_request_parts(parts, state).await?;
                if !auth.user.role.satisfies($role) {
                    tracing::debug!(
                        "User {} with role {} denied, {} required",
                        auth.user.username,
                        auth.user.role.as_str(),
                        $role.as_str()
                    );
                    return Err(AppError::Forbidden("Not enough permissions".into()));
                }
                Ok($name(auth))
            }
        }
    };
}

require_role!(
    /// Any authenticated user.
    RequireViewer,
    Role::Viewer
);
require_role!(
    /// Operators and admins.
    RequireOperator,
    Role::Operator
);
require_role!(
    /// Admins only.
    RequireAdmin,
    Role::Admin
);

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        // ---
        assert_eq!(bearer_token(&headers_with("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers_with("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&headers_with("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_bearer_scheme_is_case_insensitive() {
        // ---
        assert_eq!(bearer_token(&headers_with("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("BEARER  abc ")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("Bearerabc")), None);
    }
}
