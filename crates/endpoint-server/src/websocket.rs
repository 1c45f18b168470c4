//! Websocket Subscriber Registry
//!
//! Browsers register for one endpoint at
//! `GET /websocketRegistration/{id}`. Each registration gets an unbounded
//! queue drained by the connection's own task, so sending from the core
//! never waits on the network.
//!
//! ```text
//!   EndpointProcessor / TrafficInitiator
//!        │ send(payload)
//!        ▼
//!   WebsocketSender(id) ── to_json ──> queue(id) ──> connection task ──> socket
//! ```
//!
//! A later registration for the same endpoint replaces the earlier one;
//! the replaced connection's queue closes and its task ends.

use crate::metrics;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use endpoint_core::{ClientSender, EndpointId, OutboundMessage, SendError, SenderRegistry};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct Subscriber {
    connection: u64,
    frames: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
struct Inner {
    subscribers: Mutex<HashMap<EndpointId, Subscriber>>,
    next_connection: AtomicU64,
}

/// The single subscriber of each endpoint. Cheap to clone.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<Inner>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribers(&self) -> MutexGuard<'_, HashMap<EndpointId, Subscriber>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new subscriber for `endpoint`, replacing any existing one.
    ///
    /// Returns the connection id (for [`unregister`](Self::unregister)) and
    /// the queue of serialized frames to write to the socket.
    pub fn register(&self, endpoint: EndpointId) -> (u64, mpsc::UnboundedReceiver<String>) {
        let connection = self.inner.next_connection.fetch_add(1, Ordering::Relaxed);
        let (frames, rx) = mpsc::unbounded_channel();

        let mut subscribers = self.subscribers();
        if subscribers
            .insert(endpoint, Subscriber { connection, frames })
            .is_some()
        {
            info!(endpoint, "Subscriber replaced by a new registration");
        }
        metrics::SUBSCRIBERS.set(subscribers.len() as i64);
        (connection, rx)
    }

    /// Remove `connection` if it is still the registered subscriber
    pub fn unregister(&self, endpoint: EndpointId, connection: u64) {
        let mut subscribers = self.subscribers();
        if subscribers
            .get(&endpoint)
            .is_some_and(|s| s.connection == connection)
        {
            subscribers.remove(&endpoint);
            debug!(endpoint, connection, "Subscriber unregistered");
        }
        metrics::SUBSCRIBERS.set(subscribers.len() as i64);
    }

    #[cfg(test)]
    fn is_registered(&self, endpoint: EndpointId) -> bool {
        self.subscribers().contains_key(&endpoint)
    }

    /// Serialize `payload` and queue it for `endpoint`'s subscriber
    pub fn send_to(&self, endpoint: EndpointId, payload: &OutboundMessage) -> Result<(), SendError> {
        let result = self.queue(endpoint, payload);
        match &result {
            Ok(()) => metrics::PAYLOADS_SENT.inc(),
            Err(_) => metrics::PAYLOAD_FAILURES.inc(),
        }
        result
    }

    fn queue(&self, endpoint: EndpointId, payload: &OutboundMessage) -> Result<(), SendError> {
        let frame = payload
            .to_json()
            .map_err(|e| SendError::Serialization(e.to_string()))?;

        let mut subscribers = self.subscribers();
        let subscriber = subscribers
            .get(&endpoint)
            .ok_or(SendError::NoSubscriber(endpoint))?;

        if subscriber.frames.send(frame).is_err() {
            subscribers.remove(&endpoint);
            metrics::SUBSCRIBERS.set(subscribers.len() as i64);
            return Err(SendError::SubscriberClosed(endpoint));
        }
        Ok(())
    }
}

impl SenderRegistry for SubscriberRegistry {
    fn sender_for(&self, endpoint: EndpointId) -> Arc<dyn ClientSender> {
        Arc::new(WebsocketSender {
            endpoint,
            registry: self.clone(),
        })
    }
}

/// Sender bound to one endpoint's websocket subscriber
pub struct WebsocketSender {
    endpoint: EndpointId,
    registry: SubscriberRegistry,
}

impl ClientSender for WebsocketSender {
    fn send(&self, payload: &OutboundMessage) -> Result<(), SendError> {
        self.registry.send_to(self.endpoint, payload)
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error })).into_response()
}

/// `GET /websocketRegistration/{id}`
pub async fn registration_handler(
    Path(raw_id): Path<String>,
    State(registry): State<SubscriberRegistry>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let endpoint: EndpointId = match raw_id.parse() {
        Ok(id) => id,
        Err(e) => {
            warn!(id = %raw_id, error = %e, "Registration with invalid endpoint id");
            return bad_request(format!("invalid endpoint id {:?}: {}", raw_id, e));
        }
    };

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            warn!(endpoint, error = %rejection, "Registration is not a websocket upgrade");
            return rejection.into_response();
        }
    };

    info!(endpoint, "Received registration request");
    upgrade.on_upgrade(move |socket| serve_subscriber(socket, endpoint, registry))
}

/// Pump queued frames to the socket until either side goes away
async fn serve_subscriber(mut socket: WebSocket, endpoint: EndpointId, registry: SubscriberRegistry) {
    let (connection, mut frames) = registry.register(endpoint);
    info!(endpoint, connection, "Subscriber registered");

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(text) => {
                    if let Err(e) = socket.send(Message::Text(text.into())).await {
                        debug!(endpoint, connection, error = %e, "Socket write failed");
                        break;
                    }
                }
                // replaced by a newer registration
                None => break,
            },
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(endpoint, connection, error = %e, "Socket read failed");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    registry.unregister(endpoint, connection);
    info!(endpoint, connection, "Subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_subscriber() {
        let registry = SubscriberRegistry::new();
        let sender = registry.sender_for(4);

        assert_eq!(
            sender.send(&OutboundMessage::connected()),
            Err(SendError::NoSubscriber(4))
        );
    }

    #[tokio::test]
    async fn test_frames_are_json() {
        let registry = SubscriberRegistry::new();
        let (_, mut frames) = registry.register(4);
        let sender = registry.sender_for(4);

        sender.send(&OutboundMessage::connected()).unwrap();
        sender.send(&OutboundMessage::request("X")).unwrap();

        assert_eq!(
            frames.recv().await.unwrap(),
            r#"{"id":"EndpointConnected","numConnections":16}"#
        );
        assert_eq!(
            frames.recv().await.unwrap(),
            r#"{"id":"TrafficRequest","character":"X"}"#
        );
    }

    #[tokio::test]
    async fn test_later_registration_replaces_earlier() {
        let registry = SubscriberRegistry::new();
        let (first_conn, mut first) = registry.register(4);
        let (_, mut second) = registry.register(4);

        registry.send_to(4, &OutboundMessage::disconnected()).unwrap();

        assert!(first.recv().await.is_none());
        assert!(second.recv().await.is_some());

        // the stale connection cannot unregister its replacement
        registry.unregister(4, first_conn);
        assert!(registry.is_registered(4));
    }

    #[test]
    fn test_closed_subscriber_is_removed() {
        let registry = SubscriberRegistry::new();
        let (_, frames) = registry.register(4);
        drop(frames);

        assert_eq!(
            registry.send_to(4, &OutboundMessage::connected()),
            Err(SendError::SubscriberClosed(4))
        );
        assert!(!registry.is_registered(4));
        assert_eq!(
            registry.send_to(4, &OutboundMessage::connected()),
            Err(SendError::NoSubscriber(4))
        );
    }

    #[test]
    fn test_unregister_own_connection() {
        let registry = SubscriberRegistry::new();
        let (connection, _frames) = registry.register(4);

        registry.unregister(4, connection);
        assert!(!registry.is_registered(4));
    }
}
