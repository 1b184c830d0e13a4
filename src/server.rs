//! Axum router construction and gateway route mapping.
//!
//! The [`app`] function wires the object routes and the infrastructure
//! endpoints to their handlers and returns a ready-to-serve
//! [`axum::Router`].  Handlers lazily trigger backend initialization, so a
//! request arriving before the startup background task finishes simply
//! joins the same once-only pipeline.

use axum::{
    body::Body,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::errors::GatewayError;
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

/// Build the axum [`Router`] with all gateway routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.timeout);

    Router::new()
        // Infrastructure endpoints.
        .route("/info", get(info_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // Object routes. The id is a single path segment; a bare or
        // trailing-slash path means the caller forgot the id.
        .route("/object/:id", get(get_object).put(put_object))
        .route("/object", get(missing_object_id).put(missing_object_id))
        .route("/object/", get(missing_object_id).put(missing_object_id))
        // Application state shared across all handlers.
        .with_state(state)
        // Bound every request by the configured timeout.
        .layer(TimeoutLayer::new(request_timeout))
        // metrics_middleware is outermost (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
}

// -- Object handlers ----------------------------------------------------------

/// `GET /object/{id}` -- fetch an object, routed by id.
async fn get_object(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, GatewayError> {
    info!(%id, "get object");
    let router = state.get_or_init_router().await?;
    let content = router.get(&id).await?;
    Ok((StatusCode::OK, content).into_response())
}

/// `PUT /object/{id}` -- store the raw request body, routed by id.
///
/// The body is read under the configured `server.max_object_size` cap, so
/// an oversized PUT is rejected mid-stream instead of being buffered whole.
async fn put_object(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Body,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let max_size = state.config.server.max_object_size as usize;
    let content = match Limited::new(body, max_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.is::<LengthLimitError>() => return Err(GatewayError::ObjectTooLarge),
        Err(err) => return Err(anyhow::anyhow!("reading request body: {err}").into()),
    };
    info!(%id, size = content.len(), "put object");
    let router = state.get_or_init_router().await?;
    router.put(&id, content).await?;
    Ok(Json(serde_json::json!({ "status": "success" })))
}

/// Fallback for object paths without an id.
async fn missing_object_id() -> GatewayError {
    GatewayError::MissingObjectId
}

// -- Infrastructure handlers --------------------------------------------------

/// `GET /info` -- plain-text service banner.
async fn info_handler() -> impl IntoResponse {
    info!("landed on info route");
    (
        [("content-type", "text/plain")],
        "This is an object storage gateway.",
    )
}

/// `GET /health` -- liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// -- Tests --------------------------------------------------------------------
