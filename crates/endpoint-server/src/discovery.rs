//! REST discovery: tells the browser which endpoints exist.

use axum::Json;
use axum::extract::State;
use endpoint_core::ManagableEndpoint;
use std::sync::Arc;
use tracing::debug;

/// `GET /endpoints`
pub async fn endpoints_handler(
    State(endpoints): State<Arc<Vec<ManagableEndpoint>>>,
) -> Json<Vec<ManagableEndpoint>> {
    debug!(endpoints = endpoints.len(), "Serving endpoint discovery");
    Json(endpoints.as_ref().clone())
}
