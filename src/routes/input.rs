//! Request-body, query and path extractors that reject with [`AppError`].
//!
//! Axum's own `Json`, `Query` and `Path` answer malformed input with a
//! plain-text body. These wrappers route the rejection through `AppError`
//! so clients always get the `{"error", "code"}` envelope.

use axum::extract::{FromRequest, FromRequestParts, Path, Query};
use axum::Json;

use crate::error::AppError;

/// JSON request body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// URL query string.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path parameters.
#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::header::CONTENT_TYPE;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use serde::Deserialize;
    use serde_json::Value;

    use crate::alerts::AlertFilter;

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Credentials {
        username: String,
        password: String,
    }

    async fn envelope(err: AppError) -> (StatusCode, Value) {
        // ---
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_json_field_is_validation_error() {
        // ---
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/token")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"username":"x"}"#))
            .unwrap();

        let Err(err) = ApiJson::<Credentials>::from_request(request, &()).await else {
            panic!("body without a password must be rejected");
        };
        let (status, body) = envelope(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["error"].as_str().unwrap().contains("password"));
    }

    #[tokio::test]
    async fn well_formed_json_is_accepted() {
        // ---
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/token")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"username":"x","password":"y"}"#))
            .unwrap();

        let Ok(ApiJson(creds)) = ApiJson::<Credentials>::from_request(request, &()).await else {
            panic!("complete body must be accepted");
        };
        assert_eq!(creds.username, "x");
    }

    #[tokio::test]
    async fn bad_query_value_is_validation_error() {
        // ---
        let (mut parts, _) = Request::builder()
            .uri("/api/v1/alerts?limit=lots")
            .body(())
            .unwrap()
            .into_parts();

        let Err(err) = ApiQuery::<AlertFilter>::from_request_parts(&mut parts, &()).await else {
            panic!("non-numeric limit must be rejected");
        };
        let (status, body) = envelope(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}
