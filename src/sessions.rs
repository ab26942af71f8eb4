//! Session manager.
//!
//! A session binds a bearer token to a user for [`SESSION_LIFETIME_DAYS`].
//! Expiry is fixed when the row is inserted; later use only touches
//! `is_active` and `last_activity`. Validation misses (unknown, expired or
//! revoked token) are reported as `None`, not as errors.
//!
//! Every operation is a single statement, so concurrent requests on the same
//! token are serialized by PostgreSQL rather than by in-process locks.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::error::{is_unique_violation, AppError, AppResult};
use crate::models::{DbId, Session, User};
use crate::schema::SESSIONS_TOKEN_KEY;

/// Sessions stay valid for thirty days from login.
pub const SESSION_LIFETIME_DAYS: i64 = 30;

const COLUMNS: &str = "id, user_id, token, expires_at, device_info, ip_address, \
                       is_active, created_at, last_activity";

// ---

/// Expiry instant for a session created at `now`.
pub fn expiry_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(SESSION_LIFETIME_DAYS)
}

/// Client details recorded alongside a new session.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
}

/// Open a new active session for `user_id` bound to `token`.
///
/// A token collision with an existing row fails with
/// [`AppError::DuplicateToken`].
pub async fn create(
    pool: &PgPool,
    user_id: DbId,
    token: &str,
    client: &ClientInfo,
) -> AppResult<Session> {
    // ---
    let now = Utc::now();
    let query = format!(
        "INSERT INTO sessions (user_id, token, expires_at, device_info, ip_address, \
                               is_active, created_at, last_activity)
         VALUES ($1, $2, $3, $4, $5, TRUE, $6, $6)
         RETURNING {COLUMNS}"
    );

    sqlx::query_as::<_, Session>(&query)
        .bind(user_id)
        .bind(token)
        .bind(expiry_from(now))
        .bind(&client.device_info)
        .bind(&client.ip_address)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, Some(SESSIONS_TOKEN_KEY)) {
                AppError::DuplicateToken
            } else {
                AppError::Database(e)
            }
        })
}

/// Resolve `token` to its user if the session is active and unexpired.
///
/// The lookup and the `last_activity` bump happen in one `UPDATE … RETURNING`
/// so two requests racing on the same token cannot lose an update. Sessions
/// owned by deactivated or soft-deleted users do not validate.
pub async fn validate(pool: &PgPool, token: &str) -> Result<Option<User>, sqlx::Error> {
    // ---
    sqlx::query_as::<_, User>(
        r#"
        UPDATE sessions AS s
           SET last_activity = $2
          FROM users AS u
         WHERE s.token = $1
           AND s.is_active = TRUE
           AND s.expires_at > $2
           AND u.id = s.user_id
           AND u.is_active = TRUE
           AND u.deleted_at IS NULL
        RETURNING u.id, u.email, u.username, u.hashed_password, u.role,
                  u.is_active, u.created_at, u.updated_at, u.deleted_at
        "#,
    )
    .bind(token)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await
}

/// All active, unexpired sessions of `user_id`, newest first.
pub async fn list_active(pool: &PgPool, user_id: DbId) -> Result<Vec<Session>, sqlx::Error> {
    // ---
    let query = format!(
        "SELECT {COLUMNS} FROM sessions
          WHERE user_id = $1
            AND is_active = TRUE
            AND expires_at > $2
          ORDER BY created_at DESC, id DESC"
    );
    sqlx::query_as::<_, Session>(&query)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_all(pool)
        .await
}

/// Deactivate the session holding `token`.
///
/// Returns `true` only if an active session was switched off, so a second
/// call for the same token returns `false`.
pub async fn invalidate(pool: &PgPool, token: &str) -> Result<bool, sqlx::Error> {
    // ---
    let result = sqlx::query("UPDATE sessions SET is_active = FALSE WHERE token = $1 AND is_active = TRUE")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Deactivate every active session of `user_id` except `except_token`.
///
/// Idempotent; returns how many sessions were switched off by this call.
pub async fn invalidate_all(
    pool: &PgPool,
    user_id: DbId,
    except_token: Option<&str>,
) -> Result<u64, sqlx::Error> {
    // ---
    let result = sqlx::query(
        r#"
        UPDATE sessions
           SET is_active = FALSE
         WHERE user_id = $1
           AND is_active = TRUE
           AND ($2::TEXT IS NULL OR token <> $2)
        "#,
    )
    .bind(user_id)
    .bind(except_token)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Delete expired and revoked sessions. Returns the number of rows removed.
pub async fn cleanup_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
    // ---
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1 OR is_active = FALSE")
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
