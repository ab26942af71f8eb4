use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use tracing::{debug, info};

use crate::alerts::{self, AlertFilter, AlertSummary};
use crate::auth::{RequireOperator, RequireViewer};
use crate::error::AppResult;
use crate::models::{Alert, DbId};
use crate::AppState;
use super::input::{ApiPath, ApiQuery};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/summary", get(alert_summary))
        .route("/alerts/{id}/acknowledge", put(acknowledge_alert))
}

/// `GET /api/v1/alerts`
async fn list_alerts(
    State(state): State<AppState>,
    _auth: RequireViewer,
    ApiQuery(filter): ApiQuery<AlertFilter>,
) -> AppResult<Json<Vec<Alert>>> {
    // ---
    debug!("GET /alerts {:?}", filter);
    Ok(Json(alerts::list(&state.pool, &filter).await?))
}

/// `GET /api/v1/alerts/summary`
async fn alert_summary(
    State(state): State<AppState>,
    _auth: RequireViewer,
) -> AppResult<Json<AlertSummary>> {
    // ---
    Ok(Json(alerts::summary(&state.pool).await?))
}

/// `PUT /api/v1/alerts/{id}/acknowledge` (operator)
///
/// The acknowledging user is the authenticated caller.
async fn acknowledge_alert(
    State(state): State<AppState>,
    RequireOperator(auth): RequireOperator,
    ApiPath(id): ApiPath<DbId>,
) -> AppResult<Json<Alert>> {
    // ---
    let alert = alerts::acknowledge(&state.pool, id, &auth.user.username).await?;
    info!("Alert {} acknowledged by {}", alert.id, auth.user.username);
    Ok(Json(alert))
}
