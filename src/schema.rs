//! Database schema management for `gridwatch`.
//!
//! Ensures required types, tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

/// Unique constraint on `sessions.token`; violations map to `DuplicateToken`.
pub const SESSIONS_TOKEN_KEY: &str = "uq_sessions_token";

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `user_role` and `alert_severity` enum types, then `users`,
/// `sessions`, `power_readings` and `alerts`. Safe to call on every startup;
/// no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Enum types have no IF NOT EXISTS form
    sqlx::query(
        r#"
        DO $$ BEGIN
            CREATE TYPE user_role AS ENUM ('admin', 'operator', 'viewer');
        EXCEPTION WHEN duplicate_object THEN NULL;
        END $$;
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        DO $$ BEGIN
            CREATE TYPE alert_severity AS ENUM ('low', 'medium', 'high', 'critical');
        EXCEPTION WHEN duplicate_object THEN NULL;
        END $$;
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id              BIGSERIAL PRIMARY KEY,
            email           TEXT        NOT NULL,
            username        TEXT        NOT NULL,
            hashed_password TEXT        NOT NULL,
            role            user_role   NOT NULL DEFAULT 'viewer',
            is_active       BOOLEAN     NOT NULL DEFAULT TRUE,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            deleted_at      TIMESTAMPTZ,
            CONSTRAINT uq_users_email    UNIQUE (email),
            CONSTRAINT uq_users_username UNIQUE (username)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // expires_at is written once at insert; only is_active/last_activity change
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id            BIGSERIAL PRIMARY KEY,
            user_id       BIGINT      NOT NULL REFERENCES users (id) ON DELETE CASCADE,
            token         TEXT        NOT NULL,
            expires_at    TIMESTAMPTZ NOT NULL,
            device_info   TEXT,
            ip_address    TEXT,
            is_active     BOOLEAN     NOT NULL DEFAULT TRUE,
            created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            last_activity TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT uq_sessions_token UNIQUE (token)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS power_readings (
            id           BIGSERIAL PRIMARY KEY,
            timestamp    TIMESTAMPTZ      NOT NULL DEFAULT NOW(),
            voltage      DOUBLE PRECISION NOT NULL,
            current      DOUBLE PRECISION NOT NULL,
            frequency    DOUBLE PRECISION NOT NULL,
            power_factor DOUBLE PRECISION,
            equipment_id TEXT             NOT NULL,
            location     TEXT             NOT NULL,
            is_anomaly   BOOLEAN          NOT NULL DEFAULT FALSE
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Acknowledgment columns move together
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
            id               BIGSERIAL PRIMARY KEY,
            timestamp        TIMESTAMPTZ    NOT NULL DEFAULT NOW(),
            severity         alert_severity NOT NULL,
            message          TEXT           NOT NULL,
            description      TEXT,
            power_reading_id BIGINT         NOT NULL REFERENCES power_readings (id) ON DELETE CASCADE,
            is_acknowledged  BOOLEAN        NOT NULL DEFAULT FALSE,
            acknowledged_by  TEXT,
            acknowledged_at  TIMESTAMPTZ,
            CONSTRAINT ck_alerts_acknowledgment CHECK (
                (is_acknowledged AND acknowledged_by IS NOT NULL AND acknowledged_at IS NOT NULL)
                OR (NOT is_acknowledged AND acknowledged_by IS NULL AND acknowledged_at IS NULL)
            )
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Basic indexes for common queries
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions (user_id)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions (expires_at)",
        "CREATE INDEX IF NOT EXISTS idx_power_readings_equipment_id ON power_readings (equipment_id)",
        "CREATE INDEX IF NOT EXISTS idx_power_readings_timestamp ON power_readings (timestamp)",
        "CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts (timestamp)",
        "CREATE INDEX IF NOT EXISTS idx_alerts_power_reading_id ON alerts (power_reading_id)",
    ];
    for ddl in indexes {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}
