//! Alert ledger: records anomalies, filters them, and tracks acknowledgment.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use crate::detector::Anomaly;
use crate::error::{AppError, AppResult};
use crate::models::{Alert, DbId, PowerReading, Severity};

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

const COLUMNS: &str = "a.id, a.timestamp, a.severity, a.message, a.description, \
                       a.power_reading_id, a.is_acknowledged, a.acknowledged_by, a.acknowledged_at";

// ---

/// Query parameters for `GET /alerts`.
#[derive(Debug, Default, Deserialize)]
pub struct AlertFilter {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub equipment_id: Option<String>,
    pub is_acknowledged: Option<bool>,
    pub severity: Option<Severity>,
}

/// Aggregate counts returned by `GET /alerts/summary`.
#[derive(Debug, Serialize)]
pub struct AlertSummary {
    pub total_alerts: i64,
    pub by_severity: BTreeMap<Severity, i64>,
    pub unacknowledged: i64,
}

/// Clamp caller-supplied paging to `skip >= 0` and `1..=MAX_LIMIT`.
pub fn page_bounds(skip: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    // ---
    let skip = skip.unwrap_or(0).max(0);
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    (skip, limit)
}

/// Record an alert for `reading` inside the caller's transaction.
pub async fn record(
    tx: &mut Transaction<'_, Postgres>,
    reading: &PowerReading,
    anomaly: &Anomaly,
) -> Result<Alert, sqlx::Error> {
    // ---
    sqlx::query_as::<_, Alert>(
        r#"
        INSERT INTO alerts (severity, message, description, power_reading_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, timestamp, severity, message, description, power_reading_id,
                  is_acknowledged, acknowledged_by, acknowledged_at
        "#,
    )
    .bind(anomaly.severity)
    .bind(format!("Anomaly detected in {}", reading.equipment_id))
    .bind(&anomaly.description)
    .bind(reading.id)
    .fetch_one(&mut **tx)
    .await
}

/// Filtered alerts, newest first.
pub async fn list(pool: &PgPool, filter: &AlertFilter) -> Result<Vec<Alert>, sqlx::Error> {
    // ---
    let (skip, limit) = page_bounds(filter.skip, filter.limit);
    let query = format!(
        "SELECT {COLUMNS}
           FROM alerts a
           JOIN power_readings r ON r.id = a.power_reading_id
          WHERE ($1::TEXT IS NULL OR r.equipment_id = $1)
            AND ($2::BOOLEAN IS NULL OR a.is_acknowledged = $2)
            AND ($3::alert_severity IS NULL OR a.severity = $3)
          ORDER BY a.timestamp DESC, a.id DESC
          OFFSET $4 LIMIT $5"
    );

    sqlx::query_as::<_, Alert>(&query)
        .bind(&filter.equipment_id)
        .bind(filter.is_acknowledged)
        .bind(filter.severity)
        .bind(skip)
        .bind(limit)
        .fetch_all(pool)
        .await
}

/// Acknowledge an alert on behalf of `username`.
///
/// The row is locked for the duration of the check-and-set, so of two
/// concurrent acknowledgments exactly one succeeds and the other sees
/// [`AppError::AlreadyAcknowledged`].
pub async fn acknowledge(pool: &PgPool, alert_id: DbId, username: &str) -> AppResult<Alert> {
    // ---
    let mut tx = pool.begin().await?;

    let query = format!("SELECT {COLUMNS} FROM alerts a WHERE a.id = $1 FOR UPDATE");
    let alert = sqlx::query_as::<_, Alert>(&query)
        .bind(alert_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Alert", alert_id))?;

    if alert.is_acknowledged {
        return Err(AppError::AlreadyAcknowledged {
            id: alert_id,
            by: alert.acknowledged_by.unwrap_or_default(),
        });
    }

    let updated = sqlx::query_as::<_, Alert>(
        r#"
        UPDATE alerts
           SET is_acknowledged = TRUE, acknowledged_by = $2, acknowledged_at = $3
         WHERE id = $1
        RETURNING id, timestamp, severity, message, description, power_reading_id,
                  is_acknowledged, acknowledged_by, acknowledged_at
        "#,
    )
    .bind(alert_id)
    .bind(username)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(updated)
}

/// Counts by severity plus the unacknowledged backlog.
pub async fn summary(pool: &PgPool) -> Result<AlertSummary, sqlx::Error> {
    // ---
    let counts: Vec<(Severity, i64)> =
        sqlx::query_as("SELECT severity, COUNT(*) FROM alerts GROUP BY severity")
            .fetch_all(pool)
            .await?;

    let unacknowledged: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM alerts WHERE is_acknowledged = FALSE")
            .fetch_one(pool)
            .await?;

    Ok(summarize(counts, unacknowledged))
}

/// Fold per-severity counts into a summary with every severity present.
fn summarize(counts: Vec<(Severity, i64)>, unacknowledged: i64) -> AlertSummary {
    // ---
    let mut by_severity: BTreeMap<Severity, i64> =
        Severity::ALL.iter().map(|s| (*s, 0)).collect();
    for (severity, count) in counts {
        *by_severity.entry(severity).or_insert(0) += count;
    }

    AlertSummary {
        total_alerts: by_severity.values().sum(),
        by_severity,
        unacknowledged,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::detector::{AnomalyDetector, DetectorConfig};
    use crate::models::NewPowerReading;
    use crate::readings;
    use crate::test_support::schema_with_user;

    /// Store an over-current reading and return the alert it raised.
    async fn raise_alert(pool: &PgPool) -> Alert {
        // ---
        let reading = NewPowerReading {
            voltage: 230.0,
            current: 160.0,
            frequency: 50.0,
            power_factor: Some(0.95),
            equipment_id: "TX-09".to_string(),
            location: "Feeder C".to_string(),
        };
        let detector = AnomalyDetector::new(DetectorConfig::default());
        readings::ingest(pool, &detector, &reading)
            .await
            .unwrap()
            .alert
            .expect("over-current reading raises an alert")
    }

    #[test]
    fn test_page_bounds() {
        // ---
        assert_eq!(page_bounds(None, None), (0, DEFAULT_LIMIT));
        assert_eq!(page_bounds(Some(20), Some(5)), (20, 5));
        assert_eq!(page_bounds(Some(-3), Some(0)), (0, 1));
        assert_eq!(page_bounds(None, Some(50_000)), (0, MAX_LIMIT));
    }

    #[test]
    fn test_summary_fills_missing_severities() {
        // ---
        let summary = summarize(vec![(Severity::High, 4), (Severity::Low, 2)], 5);
        assert_eq!(summary.total_alerts, 6);
        assert_eq!(summary.unacknowledged, 5);
        assert_eq!(summary.by_severity[&Severity::Critical], 0);
        assert_eq!(summary.by_severity[&Severity::High], 4);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["by_severity"]["low"], 2);
        assert_eq!(json["by_severity"]["medium"], 0);
    }

    #[test]
    fn test_empty_summary() {
        // ---
        let summary = summarize(Vec::new(), 0);
        assert_eq!(summary.total_alerts, 0);
        assert_eq!(summary.by_severity.len(), 4);
    }

    #[sqlx::test(migrations = false)]
    async fn test_acknowledge_once(pool: PgPool) {
        // ---
        schema_with_user(&pool, "ops").await;
        let alert = raise_alert(&pool).await;
        assert_eq!(alert.severity, Severity::Critical);

        let acked = acknowledge(&pool, alert.id, "ops").await.unwrap();
        assert!(acked.is_acknowledged);
        assert_eq!(acked.acknowledged_by.as_deref(), Some("ops"));
        assert!(acked.acknowledged_at.is_some());

        let err = acknowledge(&pool, alert.id, "someone-else").await.unwrap_err();
        match err {
            AppError::AlreadyAcknowledged { id, by } => {
                assert_eq!(id, alert.id);
                assert_eq!(by, "ops");
            }
            other => panic!("expected AlreadyAcknowledged, got {other:?}"),
        }

        let totals = summary(&pool).await.unwrap();
        assert_eq!(totals.total_alerts, 1);
        assert_eq!(totals.unacknowledged, 0);
        assert_eq!(totals.by_severity[&Severity::Critical], 1);
    }

    #[sqlx::test(migrations = false)]
    async fn test_acknowledge_unknown_alert(pool: PgPool) {
        // ---
        schema_with_user(&pool, "ops").await;

        let err = acknowledge(&pool, 4242, "ops").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::NotFound {
                entity: "Alert",
                id: 4242
            }
        ));
    }

    #[sqlx::test(migrations = false)]
    async fn test_concurrent_acknowledge_has_one_winner(pool: PgPool) {
        // ---
        schema_with_user(&pool, "ops").await;
        let alert = raise_alert(&pool).await;

        let (first, second) = tokio::join!(
            acknowledge(&pool, alert.id, "u1"),
            acknowledge(&pool, alert.id, "u2"),
        );
        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::AlreadyAcknowledged { .. }))));
    }

    #[sqlx::test(migrations = false)]
    async fn test_list_filters(pool: PgPool) {
        // ---
        schema_with_user(&pool, "ops").await;
        let first = raise_alert(&pool).await;
        raise_alert(&pool).await;
        acknowledge(&pool, first.id, "ops").await.unwrap();

        let open = AlertFilter {
            is_acknowledged: Some(false),
            ..AlertFilter::default()
        };
        assert_eq!(list(&pool, &open).await.unwrap().len(), 1);

        let other_site = AlertFilter {
            equipment_id: Some("TX-99".to_string()),
            ..AlertFilter::default()
        };
        assert!(list(&pool, &other_site).await.unwrap().is_empty());

        let all = list(&pool, &AlertFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].id > all[1].id);
    }
}
