//! HTTP surface: discovery, websocket registration and operational routes.

use crate::discovery::endpoints_handler;
use crate::metrics;
use crate::websocket::{SubscriberRegistry, registration_handler};
use axum::extract::{FromRef, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use endpoint_core::{ManagableEndpoint, RouterStats};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub endpoints: Arc<Vec<ManagableEndpoint>>,
    pub subscribers: SubscriberRegistry,
    pub router_stats: Arc<RouterStats>,
}

impl AppState {
    pub fn new(
        endpoints: Vec<ManagableEndpoint>,
        subscribers: SubscriberRegistry,
        router_stats: Arc<RouterStats>,
    ) -> Self {
        Self {
            endpoints: Arc::new(endpoints),
            subscribers,
            router_stats,
        }
    }
}

impl FromRef<AppState> for Arc<Vec<ManagableEndpoint>> {
    fn from_ref(state: &AppState) -> Self {
        state.endpoints.clone()
    }
}

impl FromRef<AppState> for SubscriberRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.subscribers.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/endpoints", get(endpoints_handler))
        .route("/websocketRegistration/{id}", get(registration_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Open CORS on every route: any origin, GET and POST. Preflight requests
/// are answered here and never reach a handler.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST"),
    );
    response
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    metrics::sync_router_stats(&state.router_stats);
    match metrics::render() {
        Ok(text) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], text).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health_handler() -> &'static str {
    "OK"
}
