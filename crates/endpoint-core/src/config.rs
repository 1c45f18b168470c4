//! Static endpoint configuration and manager tuning.

use crate::event::{EndpointId, Event};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One configured endpoint. Loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagableEndpoint {
    pub id: EndpointId,
    pub title: String,
    #[serde(rename = "maxConns")]
    pub max_connections: u32,
}

impl ManagableEndpoint {
    pub fn new(id: EndpointId, title: impl Into<String>, max_connections: u32) -> Self {
        Self {
            id,
            title: title.into(),
            max_connections,
        }
    }
}

/// Channel sizing for the manager's tasks
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Capacity of the single inbound event channel (default: 64)
    pub event_queue_capacity: usize,
    /// Capacity of each processor's private event channel (default: 16)
    pub endpoint_queue_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: 64,
            endpoint_queue_capacity: 16,
        }
    }
}

impl ManagerConfig {
    /// Create the inbound event channel the router will consume
    pub fn event_channel(&self) -> (mpsc::Sender<Event>, mpsc::Receiver<Event>) {
        mpsc::channel(self.event_queue_capacity.max(1))
    }
}
