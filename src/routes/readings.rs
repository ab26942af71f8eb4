use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{debug, info};
use validator::Validate;

use crate::auth::{RequireOperator, RequireViewer};
use crate::error::AppResult;
use crate::models::{DbId, NewPowerReading, PowerReading};
use crate::readings::{self, IngestedReading, ReadingsQuery};
use crate::AppState;
use super::input::{ApiJson, ApiPath, ApiQuery};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/readings", get(list_readings).post(create_reading))
        .route("/readings/{id}", get(get_reading))
}

/// `POST /api/v1/readings` (operator)
async fn create_reading(
    State(state): State<AppState>,
    RequireOperator(auth): RequireOperator,
    ApiJson(input): ApiJson<NewPowerReading>,
) -> AppResult<(StatusCode, Json<IngestedReading>)> {
    // ---
    input.validate()?;
    debug!("POST /readings from {} for {}", auth.user.username, input.equipment_id);

    let ingested = readings::ingest(&state.pool, &state.detector, &input).await?;
    info!(
        "Reading {} stored (anomaly: {})",
        ingested.reading.id, ingested.reading.is_anomaly
    );
    Ok((StatusCode::CREATED, Json(ingested)))
}

/// `GET /api/v1/readings`
async fn list_readings(
    State(state): State<AppState>,
    _auth: RequireViewer,
    ApiQuery(params): ApiQuery<ReadingsQuery>,
) -> AppResult<Json<Vec<PowerReading>>> {
    // ---
    debug!("GET /readings {:?}", params);
    let rows = readings::list(&state.pool, &params).await?;
    Ok(Json(rows))
}

/// `GET /api/v1/readings/{id}`
async fn get_reading(
    State(state): State<AppState>,
    _auth: RequireViewer,
    ApiPath(id): ApiPath<DbId>,
) -> AppResult<Json<PowerReading>> {
    // ---
    Ok(Json(readings::get(&state.pool, id).await?))
}
