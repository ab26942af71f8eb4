//! Route gateway (EMBP): every sibling module exports a `router()` and this
//! file merges them, so `main.rs` never sees individual endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::detector::AnomalyDetector;
use crate::Config;

mod alerts;
mod auth;
mod health;
mod input;
mod password;
mod readings;
mod sessions;
mod users;

// ---

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub detector: AnomalyDetector,
}

pub fn router(pool: PgPool, config: Config) -> Result<Router> {
    // ---
    let cors = cors_layer(&config.cors_origins)?;
    let state = AppState {
        pool,
        detector: AnomalyDetector::new(config.detector),
        config: Arc::new(config),
    };

    let api = Router::new()
        .merge(auth::router())
        .merge(readings::router())
        .merge(alerts::router())
        .merge(sessions::router())
        .merge(password::router())
        .merge(users::router());

    Ok(Router::new()
        .merge(health::router())
        .nest("/api/v1", api)
        .layer(cors)
        .with_state(state))
}

/// CORS policy. With no configured origins any origin is allowed, without
/// credentials; an explicit list also allows credentials.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    // ---
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        return Ok(layer.allow_origin(AllowOrigin::any()));
    }

    let origins = origins
        .iter()
        .map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| anyhow!("Invalid CORS origin '{}': {}", o, e))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(layer.allow_origin(origins).allow_credentials(true))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_cors_layer_accepts_origin_list() {
        // ---
        assert!(cors_layer(&[]).is_ok());
        assert!(cors_layer(&["https://ops.grid.example".to_string()]).is_ok());
    }

    #[test]
    fn test_cors_layer_rejects_bad_origin() {
        // ---
        let err = cors_layer(&["bad\norigin".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Invalid CORS origin"));
    }
}
