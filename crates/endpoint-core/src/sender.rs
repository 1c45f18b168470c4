//! Abstract Sender
//!
//! The core's only outbound capability: deliver one payload to the single
//! subscriber of one endpoint. How that happens (a websocket write, an
//! in-memory log) is up to the implementation; the core only needs the
//! failure to be visible synchronously.

use crate::event::EndpointId;
use crate::message::OutboundMessage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Errors that can occur while handing a payload to a subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Nobody has registered to receive this endpoint's payloads
    NoSubscriber(EndpointId),
    /// A subscriber was registered but its connection is gone
    SubscriberClosed(EndpointId),
    Serialization(String),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSubscriber(id) => write!(
                f,
                "No client has registered to receive events for endpoint {}",
                id
            ),
            Self::SubscriberClosed(id) => {
                write!(f, "Subscriber for endpoint {} has disconnected", id)
            }
            Self::Serialization(e) => write!(f, "Serialization failed: {}", e),
        }
    }
}

impl std::error::Error for SendError {}

/// Deliver payloads to one endpoint's subscriber
pub trait ClientSender: Send + Sync {
    fn send(&self, payload: &OutboundMessage) -> Result<(), SendError>;
}

impl<F> ClientSender for F
where
    F: Fn(&OutboundMessage) -> Result<(), SendError> + Send + Sync,
{
    fn send(&self, payload: &OutboundMessage) -> Result<(), SendError> {
        self(payload)
    }
}

/// Hands out one sender per endpoint, bound to that endpoint's id
pub trait SenderRegistry: Send + Sync {
    fn sender_for(&self, endpoint: EndpointId) -> Arc<dyn ClientSender>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// Records every payload instead of delivering it.
///
/// Can be switched into a failing mode to simulate a missing subscriber.
#[derive(Debug, Clone)]
pub struct MemorySender {
    endpoint: EndpointId,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    failing: Arc<AtomicBool>,
}

impl MemorySender {
    pub fn new(endpoint: EndpointId) -> Self {
        Self {
            endpoint,
            sent: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of everything delivered so far, in delivery order
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.log().clone()
    }

    /// Lifecycle and impairment payloads only (traffic filtered out)
    pub fn lifecycle_messages(&self) -> Vec<OutboundMessage> {
        self.log()
            .iter()
            .filter(|m| !m.is_traffic())
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.log().clear();
    }

    fn log(&self) -> MutexGuard<'_, Vec<OutboundMessage>> {
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ClientSender for MemorySender {
    fn send(&self, payload: &OutboundMessage) -> Result<(), SendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SendError::NoSubscriber(self.endpoint));
        }
        self.log().push(payload.clone());
        Ok(())
    }
}

/// Registry of [`MemorySender`]s, created on first request
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    senders: Mutex<HashMap<EndpointId, MemorySender>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recording sender for `endpoint`
    pub fn sender(&self, endpoint: EndpointId) -> MemorySender {
        self.senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(endpoint)
            .or_insert_with(|| MemorySender::new(endpoint))
            .clone()
    }

    /// Total payloads recorded across all endpoints
    pub fn total_sent(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .map(|s| s.messages().len())
            .sum()
    }
}

impl SenderRegistry for MemoryRegistry {
    fn sender_for(&self, endpoint: EndpointId) -> Arc<dyn ClientSender> {
        Arc::new(self.sender(endpoint))
    }
}
