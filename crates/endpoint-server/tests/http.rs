use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use endpoint_core::{
    EndpointManager, Event, EventKind, ManagableEndpoint, ManagerConfig, OutboundMessage,
    RouterStats, SendError, StartupBarrier,
};
use endpoint_server::{AppState, SubscriberRegistry, router};
use std::sync::Arc;
use tower::ServiceExt;

fn endpoints() -> Vec<ManagableEndpoint> {
    vec![
        ManagableEndpoint::new(1, "Edge Router", 32),
        ManagableEndpoint::new(2, "Core Switch", 8),
    ]
}

fn app() -> axum::Router {
    router(AppState::new(
        endpoints(),
        SubscriberRegistry::new(),
        Arc::new(RouterStats::default()),
    ))
}

async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = get(app(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_discovery_lists_endpoints() {
    let response = get(app(), "/endpoints").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_eq!(
        body_json(response).await,
        serde_json::json!([
            { "id": 1, "title": "Edge Router", "maxConns": 32 },
            { "id": 2, "title": "Core Switch", "maxConns": 8 }
        ])
    );
}

#[tokio::test]
async fn test_registration_rejects_non_numeric_id() {
    let response = get(app(), "/websocketRegistration/router-one").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("router-one"));
}

#[tokio::test]
async fn test_every_route_allows_any_origin() {
    for uri in ["/health", "/metrics", "/endpoints", "/websocketRegistration/x"] {
        let response = get(app(), uri).await;
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*",
            "{}",
            uri
        );
    }
}

#[tokio::test]
async fn test_preflight_is_answered() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/endpoints")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST"
    );
}

#[tokio::test]
async fn test_registration_requires_websocket_upgrade() {
    let subscribers = SubscriberRegistry::new();
    let app = router(AppState::new(
        endpoints(),
        subscribers.clone(),
        Arc::new(RouterStats::default()),
    ));

    let response = get(app, "/websocketRegistration/1").await;

    assert!(response.status().is_client_error());
    assert_eq!(
        subscribers.send_to(1, &OutboundMessage::connected()),
        Err(SendError::NoSubscriber(1))
    );
}

#[tokio::test]
async fn test_metrics_exposes_router_counters() {
    let stats = Arc::new(RouterStats::default());
    stats
        .dropped
        .fetch_add(2, std::sync::atomic::Ordering::Relaxed);
    let app = router(AppState::new(endpoints(), SubscriberRegistry::new(), stats));

    let response = get(app, "/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("endpoint_events_dropped_total 2"));
}

#[tokio::test]
async fn test_manager_delivers_to_websocket_subscriber() {
    let subscribers = SubscriberRegistry::new();
    let (_, mut frames) = subscribers.register(1);

    let config = ManagerConfig::default();
    let (events, inbound) = config.event_channel();
    let manager = EndpointManager::new(endpoints(), Arc::new(subscribers.clone()), config);
    let barrier = StartupBarrier::new();
    let handle = manager.start(inbound, &barrier);
    barrier.wait().await;

    events
        .send(Event::new(1, EventKind::DelayShort))
        .await
        .unwrap();
    // nobody listens on endpoint 2; the processor logs and carries on
    events
        .send(Event::new(2, EventKind::DelayShort))
        .await
        .unwrap();
    drop(events);
    handle.join().await;

    assert_eq!(
        frames.recv().await.unwrap(),
        r#"{"id":"EndpointImpaired","worstResponse":3000,"time":500}"#
    );
    assert!(frames.try_recv().is_err());
}
