//! User accounts: registration, lookup, password updates and soft delete.

use chrono::Utc;
use sqlx::PgPool;

use crate::error::{is_unique_violation, AppError, AppResult};
use crate::models::{DbId, Role, User};

const COLUMNS: &str = "id, email, username, hashed_password, role, is_active, \
                       created_at, updated_at, deleted_at";

// ---

/// Insert a new account. Username and email must both be unused.
pub async fn create(
    pool: &PgPool,
    email: &str,
    username: &str,
    hashed_password: &str,
    role: Role,
) -> AppResult<User> {
    // ---
    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 OR username = $2)",
    )
    .bind(email)
    .bind(username)
    .fetch_one(pool)
    .await?;

    if taken {
        return Err(already_registered());
    }

    let query = format!(
        "INSERT INTO users (email, username, hashed_password, role)
         VALUES ($1, $2, $3, $4)
         RETURNING {COLUMNS}"
    );

    // The pre-check can race with a concurrent registration
    sqlx::query_as::<_, User>(&query)
        .bind(email)
        .bind(username)
        .bind(hashed_password)
        .bind(role)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, None) {
                already_registered()
            } else {
                AppError::Database(e)
            }
        })
}

/// Look up a live (not soft-deleted) user by username.
pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>, sqlx::Error> {
    // ---
    let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1 AND deleted_at IS NULL");
    sqlx::query_as::<_, User>(&query)
        .bind(username)
        .fetch_optional(pool)
        .await
}

/// Replace the stored password hash.
pub async fn update_password(
    pool: &PgPool,
    user_id: DbId,
    hashed_password: &str,
) -> Result<bool, sqlx::Error> {
    // ---
    let result = sqlx::query(
        "UPDATE users SET hashed_password = $2, updated_at = $3
          WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .bind(hashed_password)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Mark a user deleted and inactive. Returns `false` for unknown or
/// already-deleted users.
pub async fn soft_delete(pool: &PgPool, user_id: DbId) -> Result<bool, sqlx::Error> {
    // ---
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE users SET deleted_at = $2, is_active = FALSE, updated_at = $2
          WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

fn already_registered() -> AppError {
    AppError::Conflict("Username or email already registered".to_string())
}
