//! Fixtures shared by the database-backed unit tests.
//!
//! Each `#[sqlx::test]` gets a fresh database from `DATABASE_URL`; these
//! helpers bootstrap the schema and seed rows through the normal code paths.

use sqlx::PgPool;

use crate::models::{Role, User};
use crate::{schema, users};

/// Create the schema and one viewer account named `username`.
pub async fn schema_with_user(pool: &PgPool, username: &str) -> User {
    // ---
    schema::create_schema(pool).await.expect("schema bootstrap");
    add_user(pool, username).await
}

pub async fn add_user(pool: &PgPool, username: &str) -> User {
    // ---
    users::create(
        pool,
        &format!("{username}@grid.example"),
        username,
        "$argon2id$not-a-real-hash",
        Role::Viewer,
    )
    .await
    .expect("user insert")
}
