//! Request-level gateway errors.
//!
//! The enum implements [`axum::response::IntoResponse`] so handlers can
//! simply return `Err(GatewayError::NoBackendAvailable)`.  Every variant
//! maps to HTTP 400 with a JSON body carrying the error message -- the
//! gateway surfaces backend and routing failures to the caller uniformly
//! and never distinguishes "not found" from "bad request".
//!
//! Fatal startup conditions (container runtime unreachable, zero validated
//! backends) are *not* represented here; the initialization pipeline returns
//! `anyhow::Error` and the composition root decides to exit.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request path carried no object id.
    #[error("object id missing")]
    MissingObjectId,

    /// Routing was attempted with zero validated backends.
    #[error("no backend storage available")]
    NoBackendAvailable,

    /// A PUT body exceeded the configured maximum object size.
    #[error("object exceeds maximum allowed size")]
    ObjectTooLarge,

    /// Backend I/O or initialization failure.
    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_object_id_maps_to_400() {
        let response = GatewayError::MissingObjectId.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "object id missing");
    }

    #[tokio::test]
    async fn test_no_backend_maps_to_400() {
        let response = GatewayError::NoBackendAvailable.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "no backend storage available");
    }

    #[tokio::test]
    async fn test_object_too_large_maps_to_400() {
        let response = GatewayError::ObjectTooLarge.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "object exceeds maximum allowed size");
    }

    #[tokio::test]
    async fn test_internal_error_carries_message() {
        let err = GatewayError::from(anyhow::anyhow!("backend exploded"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "backend exploded");
    }
}
