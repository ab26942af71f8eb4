//! Reading ingestion and retrieval.
//!
//! Ingestion runs the detector, stores the reading with its `is_anomaly`
//! flag and, for anomalous readings, the alert, all in one transaction.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::alerts::{self, page_bounds};
use crate::detector::AnomalyDetector;
use crate::error::{AppError, AppResult};
use crate::models::{Alert, DbId, NewPowerReading, PowerReading};

const COLUMNS: &str = "id, timestamp, voltage, current, frequency, power_factor, \
                       equipment_id, location, is_anomaly";

// ---

/// Query parameters for `GET /readings`.
#[derive(Debug, Default, Deserialize)]
pub struct ReadingsQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub equipment_id: Option<String>,
    pub is_anomaly: Option<bool>,
}

/// A stored reading plus the alert it raised, if any.
#[derive(Debug, Serialize)]
pub struct IngestedReading {
    #[serde(flatten)]
    pub reading: PowerReading,
    pub alert: Option<Alert>,
}

/// Evaluate and store a reading.
pub async fn ingest(
    pool: &PgPool,
    detector: &AnomalyDetector,
    input: &NewPowerReading,
) -> AppResult<IngestedReading> {
    // ---
    let anomaly = detector.evaluate(input);

    let mut tx = pool.begin().await?;

    let query = format!(
        "INSERT INTO power_readings
            (voltage, current, frequency, power_factor, equipment_id, location, is_anomaly)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {COLUMNS}"
    );
    let reading = sqlx::query_as::<_, PowerReading>(&query)
        .bind(input.voltage)
        .bind(input.current)
        .bind(input.frequency)
        .bind(input.power_factor)
        .bind(input.equipment_id.trim())
        .bind(input.location.trim())
        .bind(anomaly.is_some())
        .fetch_one(&mut *tx)
        .await?;

    let alert = match &anomaly {
        Some(anomaly) => {
            warn!(
                "Anomaly on {} (reading {}): {:?} - {}",
                reading.equipment_id, reading.id, anomaly.severity, anomaly.description
            );
            Some(alerts::record(&mut tx, &reading, anomaly).await?)
        }
        None => None,
    };

    tx.commit().await?;
    debug!("Stored reading {} for {}", reading.id, reading.equipment_id);

    Ok(IngestedReading { reading, alert })
}

/// Filtered readings, newest first.
pub async fn list(pool: &PgPool, params: &ReadingsQuery) -> Result<Vec<PowerReading>, sqlx::Error> {
    // ---
    let (skip, limit) = page_bounds(params.skip, params.limit);
    let query = format!(
        "SELECT {COLUMNS} FROM power_readings
          WHERE ($1::TEXT IS NULL OR equipment_id = $1)
            AND ($2::BOOLEAN IS NULL OR is_anomaly = $2)
          ORDER BY timestamp DESC, id DESC
          OFFSET $3 LIMIT $4"
    );

    sqlx::query_as::<_, PowerReading>(&query)
        .bind(&params.equipment_id)
        .bind(params.is_anomaly)
        .bind(skip)
        .bind(limit)
        .fetch_all(pool)
        .await
}

pub async fn get(pool: &PgPool, id: DbId) -> AppResult<PowerReading> {
    // ---
    let query = format!("SELECT {COLUMNS} FROM power_readings WHERE id = $1");
    sqlx::query_as::<_, PowerReading>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Reading", id))
}
